//! Canonicalization of AMP/mobile/print URL variants.
//!
//! The output doubles as the cache key, so the whole composition must be
//! idempotent: applying it twice yields the same URL as applying it once.
//! Each rewrite is independently skippable when inapplicable.

use url::Url;

const AMP_PATH_SUFFIXES: &[&str] = &["/amp", "/amp/", "/amp.html"];

/// Rewrite AMP, mobile, and print variants of a URL to the canonical form.
///
/// Fixed rewrite order:
/// 1. strip `/amp`, `/amp/`, `/amp.html` path suffixes (a bare `/amp`
///    collapses to `/`)
/// 2. strip an `amp.` hostname prefix
/// 3. remove `amp=1` / `amp=true` query parameters
/// 4. collapse `m.` / `mobile.` hostname prefixes to `www.`
/// 5. delete `print` and `plain` query parameters
pub fn canonicalize(url: &Url) -> Url {
    let mut out = url.clone();
    strip_amp_path(&mut out);
    strip_amp_host(&mut out);
    strip_amp_params(&mut out);
    collapse_mobile_host(&mut out);
    strip_print_params(&mut out);
    out
}

fn strip_amp_path(url: &mut Url) {
    let mut path = url.path().to_string();
    let mut changed = false;

    // Strip repeatedly so stacked suffixes cannot survive one pass and
    // break idempotence.
    loop {
        let before = path.len();
        for suffix in AMP_PATH_SUFFIXES {
            if let Some(stripped) = path.strip_suffix(suffix) {
                path = if stripped.is_empty() { "/".to_string() } else { stripped.to_string() };
                changed = true;
                break;
            }
        }
        if path.len() == before {
            break;
        }
    }

    if changed {
        url.set_path(&path);
    }
}

fn strip_amp_host(url: &mut Url) {
    let host = match url.host_str() {
        Some(host) => host.to_string(),
        None => return,
    };

    let mut bare = host.as_str();
    while let Some(rest) = bare.strip_prefix("amp.") {
        // Never strip down to a bare TLD.
        if !rest.contains('.') {
            break;
        }
        bare = rest;
    }

    if bare != host {
        let bare = bare.to_string();
        let _ = url.set_host(Some(&bare));
    }
}

fn strip_amp_params(url: &mut Url) {
    retain_query(url, |key, value| !(key == "amp" && (value == "1" || value == "true")));
}

fn collapse_mobile_host(url: &mut Url) {
    let host = match url.host_str() {
        Some(host) => host.to_string(),
        None => return,
    };

    let rest = host
        .strip_prefix("m.")
        .or_else(|| host.strip_prefix("mobile."));

    if let Some(rest) = rest
        && rest.contains('.')
    {
        let collapsed = format!("www.{rest}");
        let _ = url.set_host(Some(&collapsed));
    }
}

fn strip_print_params(url: &mut Url) {
    retain_query(url, |key, _| key != "print" && key != "plain");
}

fn retain_query(url: &mut Url, keep: impl Fn(&str, &str) -> bool) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, v)| keep(k, v))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.len() == url.query_pairs().count() {
        return;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
    }
}
