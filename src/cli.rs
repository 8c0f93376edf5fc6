use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const DEFAULT_CONFIG_FILE: &str = "graphql-dispatch.jsonc";
const USAGE: &str = "usage: graphql-dispatch [--config <path>] [--background] <query-file>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub query_path: PathBuf,
    pub background: bool,
}

pub fn args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1), env::current_dir()?)
}

fn parse_args(args: impl IntoIterator<Item = String>, cwd: PathBuf) -> Result<CliArgs> {
    let mut config_path = None;
    let mut query_path = None;
    let mut background = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config expects a path. {}", USAGE))?;
                config_path = Some(PathBuf::from(path));
            }
            "--background" => background = true,
            flag if flag.starts_with("--") => {
                return Err(anyhow!("unknown flag {}. {}", flag, USAGE));
            }
            _ if query_path.is_some() => {
                return Err(anyhow!("expected exactly one query file. {}", USAGE));
            }
            _ => query_path = Some(PathBuf::from(&arg)),
        }
    }

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE)),
        query_path: query_path.ok_or_else(|| anyhow!("missing query file. {}", USAGE))?,
        background,
    })
}
