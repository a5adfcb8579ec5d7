// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Reading and writing the node's RSA keys as PEM files.

pub mod pathfinder;
pub mod pemstore;

pub use pemstore::{
    read_private_key, read_public_key, write_private_key, write_public_key, PemStore,
    PemStoreError,
};
