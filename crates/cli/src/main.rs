//! Command-line entry point for `concord`.

mod app;
mod cli;
mod manifest;
mod render;

fn main() -> anyhow::Result<()> {
    app::run()
}
