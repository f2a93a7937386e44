//! Path resolution against the session's working directory

/// Resolves `param` against `cwd`.
///
/// Absolute parameters replace `cwd`. `.` and `..` segments are collapsed
/// without ever climbing above `/`, and the result never carries a
/// trailing slash unless it is the root itself.
pub fn resolve_path(cwd: &str, param: &str) -> String {
    let joined = if param.starts_with('/') {
        param.to_string()
    } else {
        format!("{}/{}", cwd, param)
    };
    normalize(&joined)
}

/// Like [`resolve_path`] but keeps only the directory part, i.e. strips
/// the last element.
pub fn resolve_directory(cwd: &str, param: &str) -> String {
    parent_of(&resolve_path(cwd, param))
}

/// The directory containing `path`; the root is its own parent.
pub fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}
