pub mod archive;
pub mod caveats;
pub mod checksum;
pub mod cleanup;
pub mod commands;
pub mod deps;
pub mod descriptor;
pub mod download;
pub mod http;
pub mod install;
pub mod layout;
pub mod livecheck;
pub mod postinstall;
pub mod runtime;
pub mod service;
pub mod template;
pub mod uninstall;
