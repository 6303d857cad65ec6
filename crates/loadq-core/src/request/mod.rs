//! Requests and transmission method resolution.
//!
//! A [`Request`] is built by the caller, optionally given a list of
//! [`Part`]s, and then shared with a loader as `Arc<Request>`. From that
//! point on only the response length may change (the transfer records the
//! length declared by the transport).
//!
//! # Method resolution
//!
//! GET is preferred. Parts are folded into the query string when every part
//! is text shorter than [`MAX_QUERY_VALUE_LEN`] characters and the composed
//! locator stays within [`MAX_COMPOSED_LEN`] characters; anything else needs
//! a multipart POST.

mod part;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LoadError, LoadResult};

pub use part::{
    BOUNDARY, CRLF, MULTIPART_CONTENT_TYPE, MULTIPART_PREAMBLE, Part, PartImageFormat,
};

/// Text values must be strictly shorter than this (in characters) to travel
/// in a query string.
pub const MAX_QUERY_VALUE_LEN: usize = 255;

/// Upper bound for `locator + query` length when composing a GET locator.
pub const MAX_COMPOSED_LEN: usize = 250;

const UNKNOWN_LENGTH: u64 = u64::MAX;

/// HTTP method used to transmit a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Parameters (if any) travel in the query string.
    Get,
    /// Parameters travel as a multipart body.
    Post,
}

impl Method {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource to load, with optional payload parts.
#[derive(Debug)]
pub struct Request {
    locator: Url,
    parts: Option<Vec<Part>>,
    method: Method,
    response_length: AtomicU64,
}

impl Request {
    /// Create a request without parts. The method is GET.
    pub const fn new(locator: Url) -> Self {
        Self {
            locator,
            parts: None,
            method: Method::Get,
            response_length: AtomicU64::new(UNKNOWN_LENGTH),
        }
    }

    /// Parse `locator` and create a request for it.
    pub fn parse(locator: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(locator)?))
    }

    /// Set the expected response length up front.
    #[must_use]
    pub fn with_response_length(self, length: u64) -> Self {
        self.set_response_length(Some(length));
        self
    }

    /// Attach parts; the method is recomputed.
    #[must_use]
    pub fn with_parts(mut self, parts: Vec<Part>) -> Self {
        self.set_parts(Some(parts));
        self
    }

    pub const fn locator(&self) -> &Url {
        &self.locator
    }

    pub fn parts(&self) -> Option<&[Part]> {
        self.parts.as_deref()
    }

    /// Mutable access to the held parts.
    ///
    /// The method is NOT recomputed after in-place edits; call
    /// [`Request::set_parts`] to replace the list and refresh it.
    pub const fn parts_mut(&mut self) -> Option<&mut Vec<Part>> {
        self.parts.as_mut()
    }

    /// Replace the parts wholesale and recompute the method.
    pub fn set_parts(&mut self, parts: Option<Vec<Part>>) {
        self.parts = parts;
        self.method = self.recommended_method();
    }

    pub const fn method(&self) -> Method {
        self.method
    }

    /// Force a method.
    ///
    /// Fails when the parts can only be sent by POST and GET is requested.
    pub fn set_method(&mut self, method: Method) -> LoadResult<()> {
        if method == Method::Get && self.recommended_method() == Method::Post {
            return Err(LoadError::state(format!(
                "parts of {} can only be sent with POST",
                self.locator
            )));
        }
        self.method = method;
        Ok(())
    }

    /// Length of the response body, if declared.
    pub fn response_length(&self) -> Option<u64> {
        match self.response_length.load(Ordering::Acquire) {
            UNKNOWN_LENGTH => None,
            n => Some(n),
        }
    }

    /// Record the length of the response body.
    pub fn set_response_length(&self, length: Option<u64>) {
        self.response_length
            .store(length.unwrap_or(UNKNOWN_LENGTH), Ordering::Release);
    }

    /// Compute the method from the current parts.
    ///
    /// Recomputed on every call.
    pub fn recommended_method(&self) -> Method {
        if self.parts.is_none() || self.try_compose().is_some() {
            Method::Get
        } else {
            Method::Post
        }
    }

    /// The locator with text parts appended as a query string.
    ///
    /// Returns the unmodified locator when the parts cannot be composed.
    pub fn compose_locator(&self) -> Url {
        self.try_compose().unwrap_or_else(|| self.locator.clone())
    }

    fn composed_query(&self) -> Option<String> {
        let parts = self.parts.as_ref()?;
        let mut pairs = Vec::with_capacity(parts.len());
        for part in parts {
            let value = part.text_value()?;
            if value.chars().count() >= MAX_QUERY_VALUE_LEN {
                return None;
            }
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(part.name()),
                urlencoding::encode(value)
            ));
        }
        Some(pairs.join("&"))
    }

    fn try_compose(&self) -> Option<Url> {
        let query = self.composed_query()?;
        if query.len() + self.locator.as_str().len() > MAX_COMPOSED_LEN {
            return None;
        }
        if query.is_empty() {
            return Some(self.locator.clone());
        }

        let mut composed = self.locator.clone();
        let full_query = match self.locator.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
            _ => query,
        };
        composed.set_query(Some(&full_query));
        Some(composed)
    }
}

impl Clone for Request {
    fn clone(&self) -> Self {
        Self {
            locator: self.locator.clone(),
            parts: self.parts.clone(),
            method: self.method,
            response_length: AtomicU64::new(self.response_length.load(Ordering::Acquire)),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(locator: &str) -> Request {
        Request::parse(locator).unwrap()
    }

    #[test]
    fn no_parts_is_get() {
        let req = request("http://example.com/data");
        assert_eq!(req.recommended_method(), Method::Get);
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.compose_locator(), *req.locator());
    }

    #[test]
    fn short_text_parts_compose_into_query() {
        let req = request("http://example.com/search").with_parts(vec![
            Part::text("q", "rust lang"),
            Part::text("page", "2"),
        ]);

        assert_eq!(req.method(), Method::Get);
        assert_eq!(
            req.compose_locator().as_str(),
            "http://example.com/search?q=rust%20lang&page=2"
        );
    }

    #[test]
    fn existing_query_is_extended() {
        let req = request("http://example.com/search?lang=en")
            .with_parts(vec![Part::text("q", "x")]);
        assert_eq!(
            req.compose_locator().as_str(),
            "http://example.com/search?lang=en&q=x"
        );
    }

    #[test]
    fn non_text_part_forces_post() {
        let req = request("http://example.com/upload").with_parts(vec![
            Part::text("a", "b"),
            Part::data("file", "f.bin", vec![1u8]),
        ]);
        assert_eq!(req.recommended_method(), Method::Post);
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.compose_locator(), *req.locator());
    }

    #[test]
    fn long_value_forces_post() {
        let value = "v".repeat(MAX_QUERY_VALUE_LEN);
        let req = request("http://example.com/").with_parts(vec![Part::text("k", value)]);
        assert_eq!(req.recommended_method(), Method::Post);

        let value = "v".repeat(MAX_QUERY_VALUE_LEN - 1);
        let req = request("http://example.com/").with_parts(vec![Part::text("k", value)]);
        // Each value fits but the composed locator is too long
        assert_eq!(req.recommended_method(), Method::Post);
    }

    #[test]
    fn composed_length_cap() {
        let base = "http://example.com/";
        let fits = MAX_COMPOSED_LEN - base.len() - "k=".len();
        let req = request(base).with_parts(vec![Part::text("k", "v".repeat(fits))]);
        assert_eq!(req.recommended_method(), Method::Get);

        let req = request(base).with_parts(vec![Part::text("k", "v".repeat(fits + 1))]);
        assert_eq!(req.recommended_method(), Method::Post);
    }

    #[test]
    fn empty_parts_is_get() {
        let req = request("http://example.com/x").with_parts(Vec::new());
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.compose_locator().as_str(), "http://example.com/x");
    }

    #[test]
    fn forcing_get_on_post_only_parts_fails() {
        let mut req = request("http://example.com/upload")
            .with_parts(vec![Part::data("file", "f.bin", vec![1u8])]);
        let err = req.set_method(Method::Get).unwrap_err();
        assert!(matches!(err, LoadError::State { .. }));
        assert_eq!(req.method(), Method::Post);
    }

    #[test]
    fn forcing_post_is_always_allowed() {
        let mut req = request("http://example.com/");
        req.set_method(Method::Post).unwrap();
        assert_eq!(req.method(), Method::Post);
    }

    #[test]
    fn in_place_mutation_keeps_stale_method() {
        let mut req = request("http://example.com/").with_parts(vec![Part::text("a", "b")]);
        assert_eq!(req.method(), Method::Get);

        req.parts_mut()
            .unwrap()
            .push(Part::data("file", "f.bin", vec![1u8]));
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.recommended_method(), Method::Post);

        let parts = req.parts().unwrap().to_vec();
        req.set_parts(Some(parts));
        assert_eq!(req.method(), Method::Post);
    }

    #[test]
    fn response_length_roundtrip() {
        let req = request("http://example.com/");
        assert_eq!(req.response_length(), None);
        req.set_response_length(Some(42));
        assert_eq!(req.response_length(), Some(42));
        req.set_response_length(None);
        assert_eq!(req.response_length(), None);
    }
}
