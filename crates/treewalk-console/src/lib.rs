//! Colorful console output for the tree-walk engine.
//!
//! Provides a custom `tracing` layer that formats walk lifecycle events
//! with colors.
//!
//! ## Log Levels
//!
//! - **INFO**: Lifecycle events (walk start/end, phase start/end)
//! - **DEBUG**: Queue builder and runner progress detail

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use treewalk_engine::WalkCountersSnapshot;

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();
static WALK_START_NANOS: AtomicU64 = AtomicU64::new(0);

/// Package version for banner display.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the engine console output.
///
/// Safe to call multiple times - only the first call has effect. Prints a
/// banner and sets up a `tracing` subscriber with the colored layer.
pub fn init() {
    INIT.get_or_init(|| {
        print_banner();

        let filter = EnvFilter::builder()
            .with_default_directive("treewalk_engine=info".parse().unwrap())
            .from_env_lossy();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(WalkConsoleLayer)
            .try_init();
    });
}

fn mark_walk_start() {
    let epoch = EPOCH.get_or_init(Instant::now);
    let nanos = epoch.elapsed().as_nanos() as u64;
    WALK_START_NANOS.store(nanos, Ordering::Relaxed);
}

fn elapsed_secs() -> f64 {
    let Some(epoch) = EPOCH.get() else {
        return 0.0;
    };
    let start_nanos = WALK_START_NANOS.load(Ordering::Relaxed);
    let now_nanos = epoch.elapsed().as_nanos() as u64;
    (now_nanos - start_nanos) as f64 / 1_000_000_000.0
}

fn print_banner() {
    let banner = r#"
 _____                __        __    _ _
|_   _| __ ___  ___  \ \      / /_ _| | | __
  | || '__/ _ \/ _ \  \ \ /\ / / _` | | |/ /
  | || | |  __/  __/   \ V  V / (_| | |   <
  |_||_|  \___|\___|    \_/\_/ \__,_|_|_|\_\
"#;

    let version_line = format!(
        "                 v{} - Distributed Tree-Walk Engine\n",
        VERSION
    );

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats walk lifecycle events with colors.
pub struct WalkConsoleLayer;

impl<S: Subscriber> Layer<S> for WalkConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();

        if !target.starts_with("treewalk_engine") && !target.starts_with("treewalk::") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    phase: Option<String>,
    rank: Option<i64>,
    world_size: Option<u64>,
    symmetric: Option<bool>,
    duration_ms: Option<u64>,
    imported: Option<u64>,
    results: Option<u64>,
    particles_visited: Option<u64>,
    interactions: Option<u64>,
    exports: Option<u64>,
    imports: Option<u64>,
    nodes_culled: Option<u64>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        match field.name() {
            "event" => self.event = Some(s.trim_matches('"').to_string()),
            "phase" => self.phase = Some(s.trim_matches('"').to_string()),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "world_size" => self.world_size = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            "imported" => self.imported = Some(value),
            "results" => self.results = Some(value),
            "particles_visited" => self.particles_visited = Some(value),
            "interactions" => self.interactions = Some(value),
            "exports" => self.exports = Some(value),
            "imports" => self.imports = Some(value),
            "nodes_culled" => self.nodes_culled = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "rank" => self.rank = Some(value),
            _ => self.record_u64(field, value.max(0) as u64),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "symmetric" {
            self.symmetric = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "phase" => self.phase = Some(value.to_string()),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor) -> String {
    let event = v.event.as_deref().unwrap_or("");

    match event {
        "walk_start" => format_walk_start(v),
        "walk_end" => format_walk_end(v),
        "phase_start" => format_phase_start(v),
        "phase_end" => format_phase_end(v),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn format_walk_start(v: &EventVisitor) -> String {
    mark_walk_start();
    let rank = v.rank.unwrap_or(0);
    let world_size = v.world_size.unwrap_or(1);
    let symmetric = v.symmetric.unwrap_or(false);

    format!(
        "{} {} Walk starting │ rank {} │ {} ranks │ {}",
        format_elapsed(),
        "▶".bright_green().bold(),
        rank,
        world_size,
        if symmetric { "symmetric".bright_yellow().to_string() } else { "asymmetric".white().to_string() },
    )
}

fn format_walk_end(v: &EventVisitor) -> String {
    let duration = v.duration_ms.unwrap_or(0);
    let snapshot = WalkCountersSnapshot {
        particles_visited: v.particles_visited.unwrap_or(0),
        interactions: v.interactions.unwrap_or(0),
        exports: v.exports.unwrap_or(0),
        imports: v.imports.unwrap_or(0),
        top_tree_nodes_opened: 0,
        nodes_culled: v.nodes_culled.unwrap_or(0),
    };

    let mut output = format!(
        "{} {} Walk complete │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        format_duration_ms(duration).yellow(),
    );

    output.push_str("\n\n");
    output.push_str(&summary_box(&snapshot));
    output
}

fn format_phase_start(v: &EventVisitor) -> String {
    let phase = v.phase.as_deref().unwrap_or("unknown");
    format!(
        "{} {} {} started",
        format_elapsed(),
        "▶".bright_blue(),
        phase.white().bold()
    )
}

fn format_phase_end(v: &EventVisitor) -> String {
    let phase = v.phase.as_deref().unwrap_or("unknown");
    let duration = v.duration_ms.unwrap_or(0);

    let mut output = format!(
        "{} {} {} ended │ {}",
        format_elapsed(),
        "◀".bright_blue(),
        phase.white().bold(),
        format_duration_ms(duration).yellow(),
    );

    if let Some(imported) = v.imported {
        output.push_str(&format!(
            " │ {} imported",
            imported.to_formatted_string(&Locale::en).bright_magenta().bold()
        ));
    }
    if let Some(results) = v.results {
        output.push_str(&format!(
            " │ {} results",
            results.to_formatted_string(&Locale::en).bright_magenta().bold()
        ));
    }

    output
}

fn summary_box(snapshot: &WalkCountersSnapshot) -> String {
    let mut output = String::new();
    output.push_str(
        &"╔══════════════════════════════════════════════════════════╗"
            .bright_cyan()
            .to_string(),
    );
    output.push('\n');

    for (label, value) in [
        ("Particles visited:", snapshot.particles_visited),
        ("Interactions:", snapshot.interactions),
        ("Exports:", snapshot.exports),
        ("Imports:", snapshot.imports),
        ("Nodes culled:", snapshot.nodes_culled),
    ] {
        output.push_str(&format!(
            "{}  {:<22}{:>32}  {}",
            "║".bright_cyan(),
            label,
            value.to_formatted_string(&Locale::en),
            "║".bright_cyan()
        ));
        output.push('\n');
    }

    output.push_str(&format!(
        "{}  {:<22}{:>32.3}  {}",
        "║".bright_cyan(),
        "Mean interactions/particle:",
        snapshot.mean_interactions_per_particle(),
        "║".bright_cyan()
    ));
    output.push('\n');

    output.push_str(
        &"╚══════════════════════════════════════════════════════════╝"
            .bright_cyan()
            .to_string(),
    );
    output.push('\n');
    output
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}
