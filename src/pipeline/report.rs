//! Plain-text rendering of a [`PlayerReport`] for the console.

use std::fmt;

use super::PlayerReport;
use crate::calculate::percent;
use crate::models::Age;

const RULE_WIDTH: usize = 60;

impl PlayerReport {
    /// Render the summary printed by the `report` command.
    pub fn to_console_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlayerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{}", heavy)?;
        writeln!(
            f,
            "Stats for {}",
            stats.player_name.as_deref().unwrap_or("unknown player")
        )?;
        if let Some(rating) = self.rating {
            writeln!(f, "Rating: {}", rating)?;
        }
        writeln!(f, "Total matches: {}", stats.total)?;
        writeln!(f, "Wins: {} ({}%)", stats.total_wins, stats.win_percent)?;
        writeln!(f, "Analysed: {} (skipped {})", stats.analyzed, stats.skipped)?;
        writeln!(f, "Best map: {}", stats.best_map.as_deref().unwrap_or("N/A"))?;
        writeln!(
            f,
            "Most used opening: {}",
            stats.most_used_opening.as_deref().unwrap_or("N/A")
        )?;
        writeln!(f, "{}", light)?;

        writeln!(f, "Maps played:")?;
        for (map, count) in &stats.map_counts {
            writeln!(f, "- {}: {}", map, count)?;
        }

        writeln!(f, "Wins by map:")?;
        for (map, count) in &stats.win_maps {
            writeln!(f, "- {}: {}", map, count)?;
        }

        writeln!(f, "Openings used:")?;
        for (opening, count) in &stats.openings {
            writeln!(
                f,
                "- {}: {} ({}%)",
                opening,
                count,
                percent(*count, stats.total)
            )?;
        }

        writeln!(f, "Opponent openings in defeats:")?;
        for (opening, count) in &stats.lose_openings {
            writeln!(f, "- {}: {}", opening, count)?;
        }

        writeln!(f, "{}", light)?;
        writeln!(f, "Average age-up times:")?;
        for age in Age::ALL {
            writeln!(f, "{}: {}", label(age), stats.ages.get(age).avg_hms)?;
        }

        writeln!(f, "Opponent average age-up times:")?;
        for age in Age::ALL {
            writeln!(f, "{}: {}", label(age), stats.ages.get(age).opp_avg_hms)?;
        }
        writeln!(f, "{}", heavy)
    }
}

fn label(age: Age) -> &'static str {
    match age {
        Age::Feudal => "Feudal",
        Age::Castle => "Castle",
        Age::Imperial => "Imperial",
    }
}
