// ABOUTME: Request security helpers for the HTTP surface
// ABOUTME: Currently limited to cookie parsing for session token extraction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

/// Cookie header parsing
pub mod cookies;
