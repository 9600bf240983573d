//! `plugin-index status` handler.

use crate::commands::KindArg;
use crate::component::{Branch, ComponentKind};
use crate::config::IndexerConfig;
use crate::error::IndexResult;
use crate::store::{BranchRecord, IndexStore};
use colored::Colorize;
use serde_json::{Map, Value};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Print the package index.
pub fn index_status(config: &IndexerConfig, json: bool, kind: Option<KindArg>) -> IndexResult<()> {
    let store = IndexStore::load(&config.index_path())?;
    let kinds = KindArg::select(kind);

    if json {
        println!("{}", serde_json::to_string_pretty(&status_json(&store, &kinds)?)?);
        return Ok(());
    }

    println!(
        "  {} {}",
        "index".bold(),
        config.index_path().display().to_string().dimmed()
    );
    for branch in Branch::ALL {
        let stamped = store
            .timestamps
            .get(&branch)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("    {:<6} {}", branch.as_str(), stamped.dimmed());
    }
    println!();

    for kind in kinds {
        let entries = store.entries(kind);
        println!(
            "  {} {}",
            kind.dir_name().bold(),
            format!("({})", entries.len()).dimmed()
        );

        if entries.is_empty() {
            println!("    {}", "none".dimmed());
        }

        let width = entries.keys().map(String::len).max().unwrap_or(0);
        for (name, entry) in entries {
            println!(
                "    {:<width$}  {} {}  {} {}",
                name,
                "main".dimmed(),
                format_record(entry.main.as_ref()),
                "dev".dimmed(),
                format_record(entry.dev.as_ref()),
                width = width
            );
        }
        println!();
    }

    Ok(())
}

fn format_record(record: Option<&BranchRecord>) -> String {
    match record {
        Some(r) => format!("{:<10}", r.version).bright_green().to_string(),
        None => format!("{:<10}", "-").dimmed().to_string(),
    }
}

/// The index as JSON, limited to the selected kinds.
fn status_json(store: &IndexStore, kinds: &[ComponentKind]) -> IndexResult<Value> {
    let Value::Object(mut map) = serde_json::to_value(store)? else {
        return Ok(Value::Object(Map::new()));
    };

    for kind in ComponentKind::ALL {
        if !kinds.contains(&kind) {
            map.remove(kind.dir_name());
        }
    }
    Ok(Value::Object(map))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn test_record_column_is_padded() {
        colored::control::set_override(false);
        let record = BranchRecord::new(Version::parse("1.2.0").unwrap());
        assert_eq!(format_record(Some(&record)), "1.2.0     ");
        assert_eq!(format_record(None), "-         ");
    }

    #[test]
    fn test_status_json_filters_kinds() {
        let mut store = IndexStore::default();
        store.set(
            ComponentKind::Integration,
            "foo",
            Branch::Main,
            BranchRecord::new(Version::new(1, 0, 0)),
        );
        store.set(
            ComponentKind::Platform,
            "bar",
            Branch::Dev,
            BranchRecord::new(Version::new(0, 1, 0)),
        );

        let value = status_json(&store, &[ComponentKind::Integration]).unwrap();
        assert_eq!(value["integrations"]["foo"]["main"]["version"], "1.0.0");
        assert!(value.get("platforms").is_none());
        assert!(value.get("timestamps").is_some());
    }
}
