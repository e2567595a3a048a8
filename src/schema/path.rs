// Schema path helpers.
//
// Schema paths look like `/ietf-interfaces:interfaces/interface/ietf-ip:ipv4`:
// a module prefix appears on the first segment and wherever an augment
// switches modules. The stripped form drops every prefix.

/// Drop the `module:` prefix of one segment.
#[inline]
pub fn local_name(segment: &str) -> &str {
    match segment.rfind(':') {
        Some(i) => &segment[i + 1..],
        None => segment,
    }
}

/// Module prefix of one segment, if any.
#[inline]
pub fn module_of(segment: &str) -> Option<&str> {
    segment.find(':').map(|i| &segment[..i])
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Path with every module prefix removed; always starts with `/`.
pub fn strip_prefixes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for seg in segments(path) {
        out.push('/');
        out.push_str(local_name(seg));
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Path with its last segment removed, or `None` at the root.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let i = trimmed.rfind('/')?;
    if i == 0 {
        if trimmed.len() > 1 { Some("/") } else { None }
    } else {
        Some(&trimmed[..i])
    }
}

/// Append a stripped segment to a stripped context path.
pub fn join(context: &str, name: &str) -> String {
    let name = local_name(name);
    if context.is_empty() || context == "/" {
        format!("/{name}")
    } else {
        format!("{context}/{name}")
    }
}

/// Number of equal leading segments.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    segments(a)
        .zip(segments(b))
        .take_while(|(x, y)| x == y)
        .count()
}

/// Last segment, stripped.
pub fn last_local(path: &str) -> &str {
    segments(path).last().map(local_name).unwrap_or("")
}
