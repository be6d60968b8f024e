use crate::output::{print_json, print_table};
use anyhow::Context;
use bmad_core::{Status, StatusStore};
use std::path::Path;

pub fn show(root: &Path, story: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = StatusStore::new(root);

    let Some(story) = story else {
        let map = store.read().context("failed to read sprint status")?;
        if json {
            return print_json(&map);
        }
        let rows = map.into_iter().map(|(k, v)| vec![k, v]).collect();
        print_table(&["STORY", "STATUS"], rows);
        return Ok(());
    };

    let status = store
        .get_status(story)
        .with_context(|| format!("cannot read status of {story}"))?;
    if json {
        print_json(&serde_json::json!({ "story": story, "status": status }))
    } else {
        println!("{story}: {status}");
        Ok(())
    }
}

pub fn set(root: &Path, story: &str, status: &str, json: bool) -> anyhow::Result<()> {
    let status: Status = status.parse()?;
    let store = StatusStore::new(root);
    store
        .update_status(story, status)
        .with_context(|| format!("cannot update status of {story}"))?;
    if json {
        print_json(&serde_json::json!({ "story": story, "status": status }))
    } else {
        println!("{story}: {status}");
        Ok(())
    }
}
