// ABOUTME: Cookie header parsing for extracting the session access token
// ABOUTME: Reads individual values out of the Cookie request header by name
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

use axum::http::{header, HeaderMap};

/// Extract a cookie value by name from the request headers
///
/// Returns `None` when the `Cookie` header is absent, malformed, or does not
/// contain the named cookie.
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;

    cookies.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}
