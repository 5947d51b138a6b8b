// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Unit tests for the DMA controller organized by category

mod channels;
mod helpers;
mod transfers;
