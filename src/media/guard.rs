//! Path authorization for the `/public` media tree.
//!
//! `profile/*` is world-readable. `posts/<owner_id>/*` is readable only by
//! the owner; any other principal, or an anonymous request, is denied. Any
//! other prefix is denied outright.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
}

pub fn check(path: &str, principal: Option<&str>) -> Access {
    if path.starts_with('/') || path.contains('\\') {
        return Access::Denied;
    }
    let mut components = path.split('/');
    if path.split('/').any(|c| c == "..") {
        return Access::Denied;
    }

    match components.next() {
        Some("profile") => Access::Granted,
        Some("posts") => match (components.next(), principal) {
            (Some(owner), Some(user)) if !owner.is_empty() && owner == user => Access::Granted,
            _ => Access::Denied,
        },
        _ => Access::Denied,
    }
}
