//! Point-in-time process-tree queries.
//!
//! On Linux the tree is rebuilt from `/proc/<pid>/stat` on every call; nothing is cached,
//! since children may exit or be re-parented between two calls.
use std::collections::VecDeque;
use std::io;

use cirno_core::Pid;

/// Every current descendant of `root`, parents before children, `root` excluded.
pub fn descendants(root: Pid) -> io::Result<Vec<Pid>> {
    let table = linux_impl::parent_table()?;
    Ok(collect_descendants(root, &table))
}

/// Walk a `(pid, ppid)` table breadth-first from `root`.
pub(crate) fn collect_descendants(root: Pid, table: &[(Pid, Pid)]) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut frontier = VecDeque::from([root]);
    while let Some(parent) = frontier.pop_front() {
        for &(pid, ppid) in table {
            if ppid == parent && pid != root && !found.contains(&pid) {
                found.push(pid);
                frontier.push_back(pid);
            }
        }
    }
    found
}

/// Parent pid from the content of `/proc/<pid>/stat`.
///
/// The command name in field 2 may contain spaces and parentheses, so parsing starts after
/// the last `)`.
pub(crate) fn parse_ppid(stat: &str) -> Option<Pid> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use std::fs;
    use std::io;

    use cirno_core::Pid;

    use super::parse_ppid;

    pub fn parent_table() -> io::Result<Vec<(Pid, Pid)>> {
        let mut table = Vec::new();
        for entry in fs::read_dir("/proc")? {
            let Ok(entry) = entry else {
                continue;
            };
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Pid>().ok())
            else {
                continue;
            };
            // The process may be gone by now.
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some(ppid) = parse_ppid(&stat) {
                table.push((pid, ppid));
            }
        }
        Ok(table)
    }
}

#[cfg(not(target_os = "linux"))]
mod linux_impl {
    use std::io;

    use cirno_core::Pid;

    pub fn parent_table() -> io::Result<Vec<(Pid, Pid)>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "descendant discovery needs /proc",
        ))
    }
}
