use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trip_planner_orchestrator::{
    config::PlannerConfig,
    model::GeminiClient,
    models::{PartySize, TravelStyle, UserPreferences},
    planner::{PlannerSettings, TripPlanner},
};

fn sample_preferences() -> Result<UserPreferences, Box<dyn std::error::Error>> {
    Ok(UserPreferences {
        destination: "Hanoi".to_string(),
        start_date: NaiveDate::from_ymd_opt(2023, 10, 27).ok_or("invalid sample date")?,
        end_date: NaiveDate::from_ymd_opt(2023, 10, 30).ok_or("invalid sample date")?,
        style: vec![TravelStyle::Foodie, TravelStyle::Cultural],
        prompt: "Street food, lakes and a water puppet show".to_string(),
        budget: Some("Moderate".to_string()),
        exact_budget: None,
        currency: Some("USD".to_string()),
        party_size: PartySize { adults: 2, children: 0 },
    })
}

fn load_preferences() -> Result<UserPreferences, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => sample_preferences(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();

    let config = PlannerConfig::from_env()?;
    let prefs = load_preferences()?;

    info!(
        destination = %prefs.destination,
        start = %prefs.start_date,
        end = %prefs.end_date,
        "Planning trip"
    );

    let model = Arc::new(GeminiClient::new(&config)?);
    let planner = TripPlanner::new(model, PlannerSettings::from(&config));

    match planner.generate_trip(&prefs).await {
        Ok(trip) => {
            let plan = &trip.plan;
            println!("\n=== TRIP PLAN ===");
            println!("Trip ID: {}", trip.trip_id);
            println!("{}", plan.summary);
            println!(
                "\nTotal: {} {} | {} days | {} events",
                plan.stats.total_cost,
                plan.stats.currency,
                plan.stats.duration_days,
                plan.stats.total_events
            );
            println!("Weather: {}", plan.stats.weather_summary);

            println!("\nTips:");
            for tip in plan.tip_list() {
                println!("  - {}", tip);
            }

            for day in &plan.itinerary {
                println!("\nDay {} ({}): {}", day.day, day.date, day.theme);
                for evt in &day.events {
                    println!(
                        "  {:>8}  [{}] {} @ {} ({} {})",
                        evt.time, evt.event_type, evt.activity, evt.location_name, evt.cost_estimate, evt.currency
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            eprintln!("Trip generation failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
