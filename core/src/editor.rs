//! Interactive secret editing through `$EDITOR`.
//!
//! Secrets are written in a framed form: the name on its own line, the
//! value lines, then a line holding only `.`. Value lines that start with
//! `.` get one extra leading `.`, so any value survives the trip.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use crate::api::models::ChangeRequest;

pub const DEFAULT_EDITOR: &str = "vi";

const TERMINATOR: &str = ".";

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("unable to parse EDITOR value {0:?}")]
    InvalidEditor(String),

    #[error("unable to start editor {editor}: {source}")]
    Spawn {
        editor: String,
        #[source]
        source: std::io::Error,
    },

    #[error("editor exited with code {0}")]
    EditorFailed(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trims and uppercases `name`, then checks it against `[A-Z_][A-Z0-9_]*`.
pub fn normalize_name(name: &str) -> Option<String> {
    let name = name.trim().to_ascii_uppercase();
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_uppercase() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
        return None;
    }
    Some(name)
}

pub fn serialize(secrets: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in secrets {
        out.push_str(name);
        out.push('\n');
        for line in value.split('\n') {
            if line.starts_with('.') {
                out.push('.');
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(TERMINATOR);
        out.push('\n');
    }
    out
}

pub fn parse(buffer: &str) -> Result<BTreeMap<String, String>, EditorError> {
    let mut secrets = BTreeMap::new();
    let mut lines = buffer.split('\n').enumerate();

    while let Some((index, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let name = normalize_name(line).ok_or_else(|| EditorError::Parse {
            line: index + 1,
            reason: format!("invalid secret name {:?}", line.trim()),
        })?;

        let mut value_lines = Vec::new();
        let mut terminated = false;
        for (_, line) in lines.by_ref() {
            if line == TERMINATOR {
                terminated = true;
                break;
            }
            value_lines.push(line.strip_prefix('.').unwrap_or(line));
        }
        if !terminated {
            return Err(EditorError::Parse {
                line: index + 1,
                reason: format!("value of {name} is not terminated by a line containing only '.'"),
            });
        }
        if secrets.insert(name.clone(), value_lines.join("\n")).is_some() {
            return Err(EditorError::Parse {
                line: index + 1,
                reason: format!("{name} appears more than once"),
            });
        }
    }
    Ok(secrets)
}

/// Change requests turning `original` into `edited`. Names missing from
/// `edited` are deleted; new names are created.
pub fn diff(original: &BTreeMap<String, String>, edited: &BTreeMap<String, String>) -> Vec<ChangeRequest> {
    let names: BTreeSet<&String> = original.keys().chain(edited.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| match (original.get(name), edited.get(name)) {
            (Some(_), None) => Some(ChangeRequest::delete(name.as_str())),
            (None, Some(value)) => Some(ChangeRequest::create(name.as_str(), value.as_str())),
            (Some(before), Some(after)) if before != after => {
                Some(ChangeRequest::update(name.as_str(), before.as_str(), after.as_str()))
            }
            _ => None,
        })
        .collect()
}

/// `$EDITOR` split into program and arguments.
pub fn editor_command(editor: Option<&str>) -> Result<Vec<String>, EditorError> {
    let editor = editor.map(str::trim).filter(|e| !e.is_empty());
    let Some(editor) = editor else {
        return Ok(vec![DEFAULT_EDITOR.to_string()]);
    };
    match shlex::split(editor) {
        Some(argv) if !argv.is_empty() => Ok(argv),
        _ => Err(EditorError::InvalidEditor(editor.to_string())),
    }
}

/// A file the editor can open by path while the contents stay private to
/// this process.
struct EditBuffer {
    file: std::fs::File,
    path: String,
    #[cfg(not(target_os = "linux"))]
    _temp: tempfile::TempPath,
}

impl EditBuffer {
    #[cfg(target_os = "linux")]
    fn create() -> Result<Self, EditorError> {
        use std::os::fd::FromRawFd;

        // SAFETY: the name is a valid C string and the flags are supported.
        let fd = unsafe { libc::memfd_create(c"doppler-secrets".as_ptr(), 0) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        // SAFETY: `fd` was just returned by memfd_create and nothing else owns it.
        let file = unsafe { std::fs::File::from_raw_fd(fd) };
        Ok(Self {
            file,
            // No CLOEXEC, so the editor inherits the descriptor at the same number.
            path: format!("/proc/self/fd/{fd}"),
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn create() -> Result<Self, EditorError> {
        let temp = tempfile::Builder::new()
            .prefix("doppler-secrets-")
            .tempfile()?;
        let (file, temp) = temp.into_parts();
        Ok(Self {
            file,
            path: temp.to_string_lossy().into_owned(),
            _temp: temp,
        })
    }

    fn write_all(&mut self, contents: &str) -> Result<(), EditorError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(contents.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn read_all(&mut self) -> Result<String, EditorError> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        self.file.read_to_string(&mut contents)?;
        Ok(contents)
    }
}

/// Opens `initial` in the user's editor and returns the saved buffer.
pub async fn edit_buffer(initial: &str, editor: Option<&str>) -> Result<String, EditorError> {
    let argv = editor_command(editor)?;
    let mut buffer = EditBuffer::create()?;
    buffer.write_all(initial)?;

    let (program, args) = argv
        .split_first()
        .ok_or_else(|| EditorError::InvalidEditor(String::new()))?;
    tracing::debug!("launching editor {program}");
    let status = tokio::process::Command::new(program)
        .args(args)
        .arg(&buffer.path)
        .status()
        .await
        .map_err(|source| EditorError::Spawn {
            editor: program.clone(),
            source,
        })?;
    if !status.success() {
        return Err(EditorError::EditorFailed(status.code().unwrap_or(1)));
    }
    buffer.read_all()
}

/// Edits `secrets` interactively and returns the resulting change requests.
pub async fn edit_secrets(
    secrets: &BTreeMap<String, String>,
    editor: Option<&str>,
) -> Result<Vec<ChangeRequest>, EditorError> {
    let edited = edit_buffer(&serialize(secrets), editor).await?;
    let edited = parse(&edited)?;
    Ok(diff(secrets, &edited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn framed_form_survives_awkward_values() {
        let secrets = map(&[
            ("CERT", "-----BEGIN-----\nabc\n-----END-----\n"),
            ("DOTS", ".\n..\n.hidden"),
            ("EMPTY", ""),
            ("PLAIN", "value"),
        ]);
        let buffer = serialize(&secrets);
        assert!(buffer.contains("\n..\n...\n..hidden\n.\n"), "{buffer}");
        assert_eq!(parse(&buffer).unwrap(), secrets);
    }

    #[test]
    fn unedited_buffer_yields_no_changes() {
        let secrets = map(&[("A", "1"), ("B", "two\nlines")]);
        let parsed = parse(&serialize(&secrets)).unwrap();
        assert!(diff(&secrets, &parsed).is_empty());
    }

    #[test]
    fn edits_become_change_requests() {
        let original = map(&[("KEEP", "k"), ("GONE", "g"), ("CHANGED", "old")]);
        let edited = parse("keep\nk\n.\n\n changed \nnew\n.\nADDED\nx\n.\n").unwrap();
        let changes = diff(&original, &edited);
        assert_eq!(
            changes,
            vec![
                ChangeRequest::create("ADDED", "x"),
                ChangeRequest::update("CHANGED", "old", "new"),
                ChangeRequest::delete("GONE"),
            ]
        );
    }

    #[test]
    fn parse_errors_point_at_the_record() {
        let err = parse("A\n1\n.\n9LIVES\nx\n.\n").unwrap_err();
        assert!(matches!(err, EditorError::Parse { line: 4, .. }), "{err}");

        let err = parse("A\nno terminator\n").unwrap_err();
        assert!(matches!(err, EditorError::Parse { line: 1, .. }), "{err}");

        let err = parse("A\n1\n.\na\n2\n.\n").unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("  api_key "), Some("API_KEY".to_string()));
        assert_eq!(normalize_name("_X1"), Some("_X1".to_string()));
        assert_eq!(normalize_name("1X"), None);
        assert_eq!(normalize_name("A-B"), None);
        assert_eq!(normalize_name(""), None);
    }

    #[test]
    fn editor_command_splits_like_a_shell() {
        assert_eq!(editor_command(None).unwrap(), vec!["vi"]);
        assert_eq!(editor_command(Some("  ")).unwrap(), vec!["vi"]);
        assert_eq!(
            editor_command(Some("code --wait")).unwrap(),
            vec!["code", "--wait"]
        );
        assert!(editor_command(Some("'unterminated")).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scripted_editor_round_trip() {
        // `sh -c SCRIPT sh FILE` stands in for an interactive editor.
        let editor = r#"sh -c 'printf "A\nedited\n.\nNEW\nn\n.\n" > "$1"' sh"#;
        let original = map(&[("A", "1"), ("B", "2")]);
        let changes = edit_secrets(&original, Some(editor)).await.unwrap();
        assert_eq!(
            changes,
            vec![
                ChangeRequest::update("A", "1", "edited"),
                ChangeRequest::delete("B"),
                ChangeRequest::create("NEW", "n"),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_editor_is_an_error() {
        let err = edit_buffer("A\n1\n.\n", Some("sh -c 'exit 3'"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::EditorFailed(3)), "{err}");
    }
}
