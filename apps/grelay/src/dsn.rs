use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;

pub(crate) fn resolve_data_dir(cli_value: &str) -> String {
    if !cli_value.trim().is_empty() {
        return cli_value.to_string();
    }
    if let Ok(value) = std::env::var("GRELAY_DATA_DIR")
        && !value.trim().is_empty()
    {
        return value;
    }
    "./data".to_string()
}

pub(crate) fn resolve_dsn(
    input: &str,
    data_dir: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    if !input.trim().is_empty() {
        ensure_sqlite_dsn(input)?;
        return Ok(input.to_string());
    }

    let db_path = PathBuf::from(data_dir).join("grelay.db");
    let db_path = db_path.to_string_lossy();
    let dsn = if db_path.starts_with('/') {
        let trimmed = db_path.trim_start_matches('/');
        format!("sqlite:///{}", trimmed)
    } else {
        format!("sqlite://{}", db_path)
    };
    ensure_sqlite_dsn(&dsn)?;
    Ok(dsn)
}

// Pre-creates the SQLite file so the pool can open it read-write.
fn ensure_sqlite_dsn(dsn: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !dsn.starts_with("sqlite:") {
        return Ok(());
    }

    let mut rest = &dsn["sqlite:".len()..];
    if rest.starts_with("//") {
        rest = &rest[2..];
    }
    if rest.is_empty() || rest.starts_with(":memory:") || rest.starts_with("memory:") {
        return Ok(());
    }

    let path_part = rest.split('?').next().unwrap_or("");
    if path_part.is_empty() {
        return Ok(());
    }

    let path = PathBuf::from(path_part);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
    }

    Ok(())
}
