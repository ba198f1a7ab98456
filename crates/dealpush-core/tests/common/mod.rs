#![allow(dead_code)]

pub mod upsert_server;
