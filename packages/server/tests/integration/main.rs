mod common;

mod admin;
mod bin;
mod download;
mod reaper;
mod upload;
