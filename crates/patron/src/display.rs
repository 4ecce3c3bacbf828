//! Result formatting for the command line. The header counts echo the
//! requested `top_k`, not the number of lines that follow.

use colored::Colorize;

use crate::donor::Donor;
use crate::event::Event;
use crate::index::Hit;
use crate::ranker::{Aggregation, RankedEvent};

pub fn rank_header(top_k: usize, aggregation: Aggregation) -> String {
  format!("Top {top_k} events by donor similarity ({aggregation}):")
}

/// `count` scores are whole numbers and print without decimals
pub fn ranked_event_line(ranked: &RankedEvent, aggregation: Aggregation) -> String {
  match aggregation {
    Aggregation::Count => format!("- {} (Score: {:.0})", ranked.event.title, ranked.score),
    Aggregation::Mean | Aggregation::Sum => format!("- {} (Score: {:.4})", ranked.event.title, ranked.score),
  }
}

pub fn match_header(top_k: usize, event: &Event) -> String {
  format!("Top {top_k} donors for event '{}' ({}):", event.title, event.id_or_empty())
}

pub fn matched_donor_line(donor: &Donor) -> String {
  format!("- {} | Cause: {} | Email: {}", donor.name, donor.primary_cause, donor.channel)
}

pub fn search_header(top_k: usize, query: &str) -> String {
  format!("Top {top_k} donors for query '{query}':")
}

/// `donor` is `None` when no donor table was supplied to resolve the hit
pub fn search_hit_line(hit: &Hit, donor: Option<&Donor>) -> String {
  let who = match donor {
    Some(donor) => donor.summary(),
    None => format!("ID {}", hit.donor_id),
  };
  format!("- Score: {:.4}, Donor: {}", hit.score, who)
}

/// A header and the result lines printed under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
  pub header: String,
  pub lines: Vec<String>,
}

impl Section {
  pub fn print(&self) {
    println!("{}", self.header.bold());
    for line in &self.lines {
      println!("{line}");
    }
  }
}
