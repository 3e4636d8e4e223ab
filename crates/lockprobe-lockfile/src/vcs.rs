//! pip-style VCS URL assembly.
//!
//! Poetry and uv record VCS origins in their own shapes; both are folded
//! into the pip form `git+https://host/repo.git@rev#subdirectory=path` so
//! that the same origin compares equal across lockfile flavors.

use url::Url;

/// Attaches a revision (and optional subdirectory) to a VCS URL.
///
/// Returns `None` when the URL cannot be rewritten safely: no parsable
/// scheme, an existing `+` scheme prefix, an `@` in the path, or leftover
/// query/fragment parts that the rewrite would clobber.
pub fn make_vcs_url(vcs: &str, url: &str, rev: &str, subdirectory: Option<&str>) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme().contains('+')
        || parsed.path().contains('@')
        || parsed.query().is_some()
        || parsed.fragment().is_some()
    {
        return None;
    }

    let mut out = String::new();
    if parsed.scheme() != vcs {
        out.push_str(vcs);
        out.push('+');
    }
    out.push_str(url);
    out.push('@');
    out.push_str(rev);
    if let Some(sub) = subdirectory {
        out.push_str("#subdirectory=");
        out.push_str(sub);
    }
    Some(out)
}

/// Normalizes uv's direct Git URL format.
///
/// uv records Git sources as `https://host/repo.git?branch=main#abcd123`:
/// the requested ref in the query (`branch`/`tag`/`rev`, later keys more
/// precise) and the resolved commit in the fragment. Returns the pip form
/// via [`make_vcs_url`], or `None` when no revision can be recovered.
pub fn vcs_url_from_uv_direct(vcs: &str, direct_url: &str) -> Option<String> {
    let parsed = Url::parse(direct_url).ok()?;

    let mut rev = String::new();
    for key in ["branch", "tag", "rev"] {
        if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == key) {
            rev = value.into_owned();
        }
    }
    if let Some(fragment) = parsed.fragment()
        && !fragment.is_empty()
    {
        rev = fragment.to_string();
    }
    if rev.is_empty() {
        return None;
    }

    let subdirectory = parsed
        .query_pairs()
        .find(|(k, _)| k == "subdirectory")
        .map(|(_, v)| v.into_owned());

    let mut base = parsed;
    base.set_query(None);
    base.set_fragment(None);

    make_vcs_url(vcs, base.as_str(), &rev, subdirectory.as_deref())
}

/// Whether a URL points at the official PyPI host.
pub fn is_pypi_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|host| host == "pypi.org"))
        .unwrap_or(false)
}
