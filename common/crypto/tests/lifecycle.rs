// Copyright 2025 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! Initialize/teardown lifecycle. Kept in its own test binary: teardown
//! wipes process-wide state, which must not race the other suites.

use shroud_crypto::{global, initialize, random, teardown, Acceleration};

#[test]
fn bring_up_tear_down_bring_up() {
    initialize(Acceleration::Off).unwrap();

    let mut buf = [0u8; 16];
    random::random_bytes(&mut buf).unwrap();
    assert!(global::locking::lock(0).is_none(), "builtin backends request no locks");

    teardown();

    // late callers get clean refusals, not crashes
    assert_eq!(
        random::random_bytes(&mut buf),
        Err(random::RandomError::NotSeeded)
    );
    assert!(global::locking::lock(0).is_none());

    // and the layer can come back up
    initialize(Acceleration::On).unwrap();
    random::random_bytes(&mut buf).unwrap();

    teardown();
}
