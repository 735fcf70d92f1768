// Entry point and high-level CLI flow.
//
// The binary is a thin presenter over the dashboard core:
// - Option [1] loads (or refreshes) the dataset, printing diagnostics.
// - Option [2] renders the KPI cards, the top-N released-vs-pending
//   table, a detail preview, and exports the view to CSV/JSON.
// - Option [3] walks the cascading filters, offering each field's
//   choices from the dataset narrowed by the selections before it.
mod aggregate;
mod clean;
mod config;
mod dashboard;
mod fetch;
mod filter;
mod output;
mod pipeline;
mod schema;
mod types;
mod util;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

use crate::dashboard::{ChartKind, Dashboard};
use crate::filter::Selection;
use crate::pipeline::SystemClock;
use crate::types::{FetchError, PipelineError};

// In-memory app state so the dataset loads once but the dashboard can be
// rendered and re-filtered many times in a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { dashboard: None }));

struct AppState {
    dashboard: Option<Dashboard>,
}

/// Read a single line of input after printing a prompt.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// One user-actionable line per error kind, so "file missing" reads
/// differently from "host unreachable" or "columns renamed upstream".
fn explain(e: &PipelineError) -> String {
    match e {
        PipelineError::Source(FetchError::NotFound(msg)) => {
            format!("Source not found or unreachable: {}", msg)
        }
        PipelineError::Source(FetchError::Transport(msg)) => {
            format!("Transport failure while fetching: {}", msg)
        }
        PipelineError::Source(FetchError::Malformed(msg)) => {
            format!("Response was not a readable table: {}", msg)
        }
        PipelineError::MalformedResponse(msg) => {
            format!("Could not parse the table: {}", msg)
        }
        PipelineError::SchemaMismatch { field } => format!(
            "Configuration problem ({}). Columns may have been renamed upstream; \
             check the schema map in dashboard.toml.",
            field
        ),
    }
}

/// Handle option [1]: build the dashboard if needed and load the data.
fn handle_load() {
    let mut state = APP_STATE.lock().unwrap();
    if state.dashboard.is_none() {
        let config = match config::DashboardConfig::load(Path::new("dashboard.toml")) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to read configuration: {:#}\n", e);
                return;
            }
        };
        match Dashboard::new(config, Box::new(SystemClock)) {
            Ok(d) => state.dashboard = Some(d),
            Err(e) => {
                eprintln!("{}\n", explain(&e));
                return;
            }
        }
    }
    let dash = state.dashboard.as_mut().unwrap();
    match dash.refresh() {
        Ok(report) => {
            println!(
                "Processing dataset... ({} rows loaded)",
                util::format_int(report.rows as i64)
            );
            if report.coerced_cells > 0 {
                println!(
                    "Note: {} numeric cells were unreadable and counted as zero.",
                    util::format_int(report.coerced_cells as i64)
                );
            }
            println!();
        }
        Err(e) => eprintln!("{}\n", explain(&e)),
    }
}

/// Handle option [2]: render KPIs, charts, and the detail preview, and
/// export the current view.
fn handle_dashboard() {
    let mut state = APP_STATE.lock().unwrap();
    let Some(dash) = state.dashboard.as_mut() else {
        println!("Error: No data loaded. Please load the dataset first (option 1).\n");
        return;
    };
    if let Err(e) = render_dashboard(dash) {
        eprintln!("{}\n", explain(&e));
    }
}

fn render_dashboard(dash: &mut Dashboard) -> Result<(), PipelineError> {
    println!("PFMS Financial Status Dashboard");
    let selected: Vec<String> = dash
        .filter_steps()
        .iter()
        .map(|s| format!("{}={}", s.field, s.selection.label()))
        .collect();
    println!("(Filters: {})\n", selected.join(", "));

    for (name, value) in dash.kpis()? {
        if name.starts_with("Total ") {
            println!("{:<18} {}", name, util::format_crore(value));
        } else {
            println!("{:<18} {}", name, util::format_int(value as i64));
        }
    }
    println!();

    println!("Top {} entries: Released vs Pending\n", dash.group_field());
    let points = dash.chart_series(ChartKind::ReleasedVsPending)?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for pair in points.chunks(2) {
        let released = &pair[0];
        let pending = pair.get(1);
        rows.push(vec![
            released.category.clone(),
            util::format_number(released.value, 2),
            pending.map_or_else(String::new, |p| util::format_number(p.value, 2)),
        ]);
    }
    output::preview_rows(
        &[
            "Category".to_string(),
            "Released".to_string(),
            "Pending".to_string(),
        ],
        &rows,
    );

    println!("Status share:\n");
    let share = dash.chart_series(ChartKind::StatusShare)?;
    let rows: Vec<Vec<String>> = share
        .iter()
        .map(|p| vec![p.category.clone(), util::format_crore(p.value)])
        .collect();
    output::preview_rows(&["Status".to_string(), "Amount".to_string()], &rows);

    println!("Detail preview:\n");
    let detail = dash.detail_rows()?;
    output::preview_dataset(&detail, 5);

    let detail_file = "filtered_rows.csv";
    if let Err(e) = output::write_dataset_csv(detail_file, &detail) {
        eprintln!("Write error: {}", e);
    }
    let summary = dash.summary_json()?;
    if let Err(e) = output::write_json("summary.json", &summary) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "(Full view exported to {}, KPIs to summary.json)\n",
        detail_file
    );
    Ok(())
}

/// Handle option [3]: walk the filter fields in cascade order. Each
/// prompt's numbered choices come from the dataset as narrowed by the
/// selections already made above it.
fn handle_filters() {
    let mut state = APP_STATE.lock().unwrap();
    let Some(dash) = state.dashboard.as_mut() else {
        println!("Error: No data loaded. Please load the dataset first (option 1).\n");
        return;
    };
    let fields: Vec<String> = dash.filter_fields().to_vec();
    for field in fields {
        let options = match dash.filter_options(&field) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("{}\n", explain(&e));
                return;
            }
        };
        println!("{}:", field);
        for (i, opt) in options.iter().enumerate() {
            println!("  [{}] {}", i, opt);
        }
        let choice = read_line("Enter choice (blank keeps current): ");
        if choice.is_empty() {
            continue;
        }
        let Ok(idx) = choice.parse::<usize>() else {
            println!("Invalid choice, keeping current selection.");
            continue;
        };
        let Some(value) = options.get(idx) else {
            println!("Invalid choice, keeping current selection.");
            continue;
        };
        let selection = if idx == 0 {
            Selection::All
        } else {
            Selection::Value(value.clone())
        };
        // Field names come from the configured cascade, so this cannot
        // miss; surface it anyway rather than unwrap.
        if let Err(e) = dash.set_filter(&field, selection) {
            eprintln!("{}\n", explain(&e));
        }
    }
    println!();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    loop {
        println!("PFMS Release vs Pending Analysis");
        println!("[1] Load / refresh the dataset");
        println!("[2] Show dashboard");
        println!("[3] Adjust filters");
        println!("[4] Exit\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_load(),
            "2" => {
                println!();
                handle_dashboard();
            }
            "3" => handle_filters(),
            "4" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-4.\n"),
        }
    }
}
