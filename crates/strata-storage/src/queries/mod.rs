// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for storage entities outside the memory graph.

pub mod kv;
