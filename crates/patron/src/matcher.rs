//! Cause-tag matching: donors whose primary cause equals the event's cause,
//! topped up at random when there are not enough of them.

use rand::seq::index;
use rand::Rng;

use crate::donor::Donor;
use crate::error::Result;
use crate::event::{find_event, Event};

/// Pick up to `top_k` donors for `event`.
///
/// Exact cause matches (case-insensitive) come first, in table order. Any
/// shortfall is filled with donors sampled without replacement from the rest of
/// the table, or all of them if fewer remain than are needed.
pub fn match_donors<'a, R: Rng + ?Sized>(
  event: &Event,
  donors: &'a [Donor],
  top_k: usize,
  rng: &mut R,
) -> Vec<&'a Donor> {
  let cause = event.cause.to_lowercase();
  let (matching, rest): (Vec<&Donor>, Vec<&Donor>) =
    donors.iter().partition(|d| d.primary_cause.to_lowercase() == cause);

  tracing::debug!("{} donors share cause `{}`", matching.len(), event.cause);

  let mut selected = matching;
  if selected.len() < top_k {
    let needed = (top_k - selected.len()).min(rest.len());
    tracing::debug!("filling {} slots from {} other donors", needed, rest.len());
    selected.extend(index::sample(rng, rest.len(), needed).into_iter().map(|i| rest[i]));
  }

  selected.truncate(top_k);
  selected
}

/// Look up `event_id` and match donors for it. Fails before selecting anything
/// when the event does not exist.
pub fn match_event<'e, 'd, R: Rng + ?Sized>(
  events: &'e [Event],
  event_id: &str,
  donors: &'d [Donor],
  top_k: usize,
  rng: &mut R,
) -> Result<(&'e Event, Vec<&'d Donor>)> {
  let event = find_event(events, event_id)?;
  Ok((event, match_donors(event, donors, top_k, rng)))
}
