//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod area;
pub mod collections;
pub mod debug;
pub mod error;
pub mod events;
pub mod gr;
pub mod instance;
pub mod interface;
pub mod lsdb;
pub mod marker;
pub mod neighbor;
pub mod packet;
pub mod tasks;
