mod budget;
mod cost;
mod version_cache;
