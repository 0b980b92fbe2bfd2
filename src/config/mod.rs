// ABOUTME: Configuration module organization for the Revu server
// ABOUTME: Environment-driven configuration is the only supported source
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

/// Environment-based configuration management
pub mod environment;
