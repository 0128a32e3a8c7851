// src/main.rs

use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, BeginSynchronizedUpdate, Clear, ClearType,
        EndSynchronizedUpdate,
    },
};
use log::info;

use stem_transport::{EditorConfig, StemEditor, StemRuntime};

/// Plays a set of separated stems in lockstep with per-stem mute, solo,
/// volume and pan, tempo retiming and WAV mixdown.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Stems as `name=url`; relative urls resolve against the API base
    #[arg(required_unless_present = "dump_config")]
    stems: Vec<String>,
    /// Tempo the stems were recorded at
    #[arg(long)]
    bpm: Option<f64>,
    /// Time signature, e.g. 3/4
    #[arg(long)]
    sig: Option<String>,
    /// Override the API base from the config
    #[arg(long)]
    api: Option<String>,
    /// JSON editor config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where exported mixes are written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Write the default config to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn parse_stem(arg: &str) -> anyhow::Result<(String, String)> {
    let (name, url) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=url, got '{arg}'"))?;
    if name.is_empty() || url.is_empty() {
        return Err(anyhow!("expected name=url, got '{arg}'"));
    }
    Ok((name.to_string(), url.to_string()))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Some(path) = &cli.dump_config {
        EditorConfig::default().save_to_disk(path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = EditorConfig::load_or_default(cli.config.as_deref())?;
    if let Some(api) = cli.api {
        config.api_base = api;
    }
    let bpm = cli.bpm.unwrap_or(config.tempo.fallback_bpm());
    let sig = cli
        .sig
        .clone()
        .unwrap_or_else(|| config.tempo.default_time_signature.clone());
    let stems = cli
        .stems
        .iter()
        .map(|s| parse_stem(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut runtime = StemRuntime::new(config).context("starting audio output")?;
    runtime.transport_mut().load_stems(stems, bpm, &sig);
    info!("Loading {} stems", runtime.transport().tracks().len());

    let (cols, _) = crossterm::terminal::size().unwrap_or((80, 24));
    let lane_width = (cols as usize).saturating_sub(6).max(16);
    let mut editor = StemEditor::new(cli.out_dir, lane_width, 4);

    enable_raw_mode()?;
    execute!(stdout(), Clear(ClearType::All))?;
    let result = run_loop(&mut runtime, &mut editor);
    disable_raw_mode()?;
    println!();
    result
}

fn run_loop(runtime: &mut StemRuntime, editor: &mut StemEditor) -> anyhow::Result<()> {
    // ~30 fps
    let frame = Duration::from_millis(33);
    let mut out = stdout();

    loop {
        if event::poll(frame)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    if ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL) {
                        break;
                    }
                    if editor.should_quit(ev.code) {
                        break;
                    }
                    editor.handle_key(runtime.transport_mut(), ev.code);
                }
            }
        }

        editor.tick(runtime.transport_mut());
        let screen = editor.compose(runtime.transport());

        execute!(out, BeginSynchronizedUpdate)?;
        out.write_all(screen.as_bytes())?;
        execute!(out, EndSynchronizedUpdate)?;
        out.flush()?;
    }

    runtime.transport_mut().close();
    Ok(())
}
