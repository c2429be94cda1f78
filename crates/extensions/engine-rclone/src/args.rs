//! rclone command line construction.

use syncflow_protocols::{ConflictPolicy, DeletePolicy, Direction, SyncRequest};

fn delete_flag(policy: DeletePolicy) -> Option<&'static str> {
    match policy {
        DeletePolicy::Never => None,
        DeletePolicy::Before => Some("--delete-before"),
        DeletePolicy::During => Some("--delete-during"),
        DeletePolicy::After => Some("--delete-after"),
    }
}

/// `--conflict-resolve` value for bisync. `none` keeps both copies renamed.
fn conflict_resolve(policy: ConflictPolicy) -> &'static str {
    match policy {
        ConflictPolicy::Newer => "newer",
        ConflictPolicy::Older => "older",
        ConflictPolicy::Larger => "larger",
        ConflictPolicy::Smaller => "smaller",
        ConflictPolicy::Rename => "none",
    }
}

/// Build the argument list for one synchronization.
///
/// One-way runs use `copy` when nothing may be deleted and `sync` with the
/// matching `--delete-*` flag otherwise. Bidirectional runs use `bisync`,
/// which always propagates deletions, so the delete policy does not apply.
pub fn build_args(request: &SyncRequest, extra_args: &[String]) -> Vec<String> {
    let local = request.source.to_string_lossy().into_owned();
    let remote = request.destination.to_string();
    let options = &request.options;
    let mut args = Vec::new();

    match request.direction {
        Direction::Bidirectional => {
            args.extend(["bisync".to_string(), local, remote]);
            args.push("--conflict-resolve".to_string());
            args.push(conflict_resolve(options.conflict_policy).to_string());
        }
        direction => {
            let delete = delete_flag(options.delete_policy);
            let verb = if delete.is_some() { "sync" } else { "copy" };
            let (from, to) = match direction {
                Direction::Download => (remote, local),
                _ => (local, remote),
            };
            args.extend([verb.to_string(), from, to]);
            if let Some(flag) = delete {
                args.push(flag.to_string());
            }
            if options.conflict_policy == ConflictPolicy::Newer {
                args.push("--update".to_string());
            }
        }
    }

    args.extend(
        // One attempt, so each failing file is reported exactly once.
        ["--use-json-log", "--log-level", "INFO", "--stats", "0", "--retries", "1"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push("--transfers".to_string());
    args.push(options.parallelism.max(1).to_string());

    for rule in &options.filters {
        args.push("--filter".to_string());
        args.push(rule.clone());
    }

    args.extend(extra_args.iter().cloned());
    args
}
