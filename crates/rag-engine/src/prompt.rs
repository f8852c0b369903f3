//! Prompt assembly from live metrics and retrieved policy snippets.

use aqi_common::Snapshot;

use crate::index::ScoredChunk;

/// Number of top-emitting zones listed in the live-context block.
const TOP_ZONES: usize = 3;

/// Render the live snapshot into the sensor-data context block.
pub fn build_live_context(live: Option<&Snapshot>) -> String {
    let Some(snap) = live else {
        return "=== LIVE WAQI/CPCB SENSOR DATA ===\nNo live data yet (first poll pending).".to_string();
    };

    let mut city_lines: Vec<String> = snap
        .cities
        .iter()
        .map(|(name, stats)| {
            format!(
                "  - {}: CO2 {:.1} kg/hr | AQI {:.0} | PM2.5 {:.1}",
                name, stats.total_co2, stats.avg_aqi, stats.avg_pm25
            )
        })
        .collect();
    city_lines.sort();

    let top_lines: Vec<String> = snap
        .top_emitters(TOP_ZONES)
        .iter()
        .enumerate()
        .map(|(i, z)| {
            format!(
                "  {}. {} ({}): CO2={:.1} AQI={:.0}",
                i + 1,
                z.zone_name,
                z.city,
                z.co2_kg_hr,
                z.aqi
            )
        })
        .collect();

    format!(
        "=== LIVE WAQI/CPCB SENSOR DATA ===\n\
         Timestamp: {}\n\n\
         City Summary:\n{}\n\n\
         Combined: Total CO2 = {:.1} kg/hr | Avg AQI = {:.0}\n\n\
         Top Emitting Zones:\n{}",
        snap.timestamp,
        city_lines.join("\n"),
        snap.total_co2,
        snap.avg_aqi,
        top_lines.join("\n")
    )
}

/// Render retrieved snippets into the policy-context block.
pub fn build_policy_context(retrieved: &[ScoredChunk]) -> String {
    retrieved
        .iter()
        .map(|chunk| format!("[{}]\n{}", chunk.title, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full prompt sent to the LLM.
pub fn build_prompt(question: &str, live: Option<&Snapshot>, retrieved: &[ScoredChunk]) -> String {
    format!(
        "You are GreenPulse AI - real-time carbon intelligence for Indian cities.\n\
         You monitor Delhi, Mumbai, Kolkata, Chennai, and Prayagraj via live WAQI/CPCB sensors.\n\n\
         {}\n\n\
         Retrieved Policy Documents:\n{}\n\n\
         Question: {}\n\n\
         Provide a concise, data-driven answer with bullet points. \
         Cite specific policies (NCAP, GRAP, Green Bharat etc.) and reference the live data. \
         Be specific about cities and zones.\n\nAnswer:",
        build_live_context(live),
        build_policy_context(retrieved),
        question
    )
}
