// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod app;
mod config;
mod map_view;
mod mission;

use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use app::KneeboardApp;
use config::AppConfig;
use mission::Mission;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "kneeboard-desktop", about = "Route and threat editor with a mirrored pop-out map")]
struct Cli {
    /// Mission file to load (JSON). The demo mission is used when omitted.
    #[arg(long)]
    mission: Option<PathBuf>,

    /// Start without the pop-out map
    #[arg(long)]
    no_popout: bool,

    /// Allow editing on the pop-out map too
    #[arg(long)]
    editable_popout: bool,

    /// Initial zoom level
    #[arg(long)]
    zoom: Option<f64>,

    /// Write the effective configuration back to disk
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if self.no_popout {
            config.show_popout = false;
        }
        if self.editable_popout {
            config.popout_editable = true;
        }
        if let Some(zoom) = self.zoom {
            config.default_zoom = zoom;
        }
    }
}

fn load_mission(path: Option<&PathBuf>) -> Mission {
    let Some(path) = path else {
        return Mission::demo();
    };
    match Mission::load(path) {
        Ok(mission) => mission,
        Err(e) => {
            error!("{e}; falling back to the demo mission");
            Mission::demo()
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    cli.apply(&mut config);
    if let Ok(path) = AppConfig::get_config_path() {
        info!("Config file: {}", path.display());
    }
    if cli.save_config {
        if let Err(e) = config.save() {
            error!("Failed to save config: {e}");
        }
    }

    let mission = load_mission(cli.mission.as_ref());
    info!("Starting Kneeboard Desktop");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("Kneeboard Desktop"),
        ..Default::default()
    };

    eframe::run_native(
        "Kneeboard Desktop",
        options,
        Box::new(move |_cc| Ok(Box::new(KneeboardApp::new(config, &mission)))),
    )
}
