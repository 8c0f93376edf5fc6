use apollo_parser::{
    Parser,
    cst::{self, CstNode},
};

use crate::graphql_client::error::{ClientError, parse_error};

/// Argument names that bound the page size of a connection field.
pub const LIMIT_ARGUMENT_NAMES: [&str; 2] = ["first", "last"];

const COST_DIVISOR: u64 = 100;

/// Estimates the rate-limit score of a query before it is sent.
///
/// Nested page sizes multiply, distinct limited paths add up, and the sum is
/// scaled down by 100 with a floor of 1.
pub fn estimate_cost(query: &str) -> Result<u64, ClientError> {
    let tree = Parser::new(query).parse();
    let errors = tree
        .errors()
        .map(|err| err.message().to_string())
        .collect::<Vec<_>>();
    if !errors.is_empty() {
        return Err(parse_error(format!(
            "parsing query: {}",
            errors.join(", ")
        )));
    }

    let document = tree.document();
    let mut total = 0_u64;
    for definition in document.definitions() {
        total = total.saturating_add(definition_cost(&definition)?);
    }

    Ok((total / COST_DIVISOR).max(1))
}

/// Raw (unscaled) score of a single definition.
fn definition_cost(definition: &cst::Definition) -> Result<u64, ClientError> {
    let selection_set = match definition {
        cst::Definition::OperationDefinition(operation) => operation.selection_set(),
        cst::Definition::FragmentDefinition(fragment) => fragment.selection_set(),
        _ => None,
    };
    let Some(selection_set) = selection_set else {
        return Ok(0);
    };

    let mut traversal = CostTraversal::default();
    traversal.visit_selection_set(&selection_set, 0)?;
    Ok(traversal.cost)
}

#[derive(Debug, Clone, Copy)]
struct ActiveLimit {
    limit: u64,
    depth: usize,
}

#[derive(Debug, Default)]
struct CostTraversal {
    limits: Vec<ActiveLimit>,
    cost: u64,
}

impl CostTraversal {
    fn visit_selection_set(
        &mut self,
        selection_set: &cst::SelectionSet,
        depth: usize,
    ) -> Result<(), ClientError> {
        for selection in selection_set.selections() {
            match selection {
                cst::Selection::Field(field) => {
                    if let Some(arguments) = field.arguments() {
                        for argument in arguments.arguments() {
                            self.visit_argument(&argument, depth)?;
                        }
                    }
                    if let Some(children) = field.selection_set() {
                        self.visit_selection_set(&children, depth + 1)?;
                    }
                }
                cst::Selection::InlineFragment(fragment) => {
                    if let Some(children) = fragment.selection_set() {
                        self.visit_selection_set(&children, depth + 1)?;
                    }
                }
                // Spreads are scored through their own fragment definition.
                cst::Selection::FragmentSpread(_) => {}
            }
        }
        Ok(())
    }

    fn visit_argument(
        &mut self,
        argument: &cst::Argument,
        depth: usize,
    ) -> Result<(), ClientError> {
        let Some(name) = argument.name() else {
            return Ok(());
        };
        let name = name.text().to_string();
        if !LIMIT_ARGUMENT_NAMES.contains(&name.as_str()) {
            return Ok(());
        }

        let Some(limit) = limit_value(&name, argument.value())? else {
            return Ok(());
        };
        self.push_limit(limit, depth);
        Ok(())
    }

    fn push_limit(&mut self, limit: u64, depth: usize) {
        // Entries at or below this depth belong to a sibling subtree we already left.
        self.limits.retain(|active| active.depth < depth);
        self.limits.push(ActiveLimit { limit, depth });

        if self.limits.len() == 1 {
            self.cost = self.cost.saturating_add(1);
            return;
        }

        let ancestors = &self.limits[..self.limits.len() - 1];
        let product = ancestors
            .iter()
            .fold(1_u64, |product, active| product.saturating_mul(active.limit));
        self.cost = self.cost.saturating_add(product);
    }
}

/// `Ok(None)` when the argument carries no literal limit (variable or null).
fn limit_value(name: &str, value: Option<cst::Value>) -> Result<Option<u64>, ClientError> {
    match value {
        None | Some(cst::Value::Variable(_)) | Some(cst::Value::NullValue(_)) => Ok(None),
        Some(cst::Value::IntValue(int)) => {
            let raw = int.syntax().text().to_string();
            raw.trim()
                .parse::<i64>()
                .ok()
                .and_then(|limit| u64::try_from(limit).ok())
                .map(Some)
                .ok_or_else(|| {
                    parse_error(format!(
                        "parsing limit: `{}` value `{}` is not a non-negative 64-bit integer",
                        name,
                        raw.trim()
                    ))
                })
        }
        Some(other) => Err(parse_error(format!(
            "parsing limit: `{}` value `{}` is not an integer",
            name,
            other.syntax().text().to_string().trim()
        ))),
    }
}
