use std::fs;
use std::path::Path;

use serde_json::{Value, json};

/// Wire the agent into the host's post-session hook list. This is a plain
/// settings-file edit; the engine knows nothing about it.
pub fn install_hook(settings_path: &Path, command: &str) -> Result<bool, String> {
    let mut settings = read_settings(settings_path)?;
    let entries = session_end_entries(&mut settings)?;
    if entries.iter().any(|entry| entry_command(entry) == Some(command)) {
        return Ok(false);
    }
    entries.push(json!({
        "hooks": [{"type": "command", "command": command}]
    }));
    write_settings(settings_path, &settings)?;
    Ok(true)
}

pub fn uninstall_hook(settings_path: &Path, command: &str) -> Result<bool, String> {
    let mut settings = read_settings(settings_path)?;
    let entries = session_end_entries(&mut settings)?;
    let before = entries.len();
    entries.retain(|entry| entry_command(entry) != Some(command));
    let removed = entries.len() != before;
    if removed {
        write_settings(settings_path, &settings)?;
    }
    Ok(removed)
}

fn read_settings(path: &Path) -> Result<Value, String> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|err| format!("parse {}: {}", path.display(), err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
        Err(err) => Err(format!("read {}: {}", path.display(), err)),
    }
}

fn write_settings(path: &Path, settings: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| format!("create {}: {}", parent.display(), err))?;
    }
    let contents = serde_json::to_string_pretty(settings)
        .map_err(|err| format!("serialize settings: {}", err))?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)
        .map_err(|err| format!("write {}: {}", temp_path.display(), err))?;
    fs::rename(&temp_path, path).map_err(|err| format!("rename {}: {}", path.display(), err))
}

fn session_end_entries(settings: &mut Value) -> Result<&mut Vec<Value>, String> {
    let root = settings
        .as_object_mut()
        .ok_or_else(|| "settings root is not an object".to_string())?;
    let hooks = root.entry("hooks").or_insert_with(|| json!({}));
    let session_end = hooks
        .as_object_mut()
        .ok_or_else(|| "settings \"hooks\" is not an object".to_string())?
        .entry("SessionEnd")
        .or_insert_with(|| json!([]));
    session_end
        .as_array_mut()
        .ok_or_else(|| "settings \"hooks.SessionEnd\" is not an array".to_string())
}

fn entry_command(entry: &Value) -> Option<&str> {
    entry
        .get("hooks")?
        .as_array()?
        .first()?
        .get("command")?
        .as_str()
}
