use crate::event::Event;

use super::ZoneProfile;

/// Ordered zone to profile table.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    profiles: Vec<ZoneProfile>,
}

impl ProfileTable {
    pub fn new(profiles: Vec<ZoneProfile>) -> Self {
        Self { profiles }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// First profile matching the event's zones, trying zones in the order
    /// the event lists them.
    pub fn resolve(&self, event: &Event) -> Option<&ZoneProfile> {
        event.zones.iter().find_map(|zone| {
            self.profiles
                .iter()
                .find(|profile| profile.zone_names.iter().any(|name| name == zone))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn profile(zones: &[&str], address: &str) -> ZoneProfile {
        ZoneProfile {
            zone_names: zones.iter().map(|z| z.to_string()).collect(),
            address: address.to_string(),
            problem_description: "Riding on sidewalk".to_string(),
        }
    }

    #[test]
    fn test_resolve_uses_event_zone_order() {
        let table = ProfileTable::new(vec![
            profile(&["north"], "1 North St"),
            profile(&["south", "curb"], "2 South St"),
        ]);
        let event = fixtures::event_in_zones("e", 0.0, 5.0, &["curb", "north"]);
        assert_eq!(table.resolve(&event).unwrap().address, "2 South St");
    }

    #[test]
    fn test_resolve_no_match() {
        let table = ProfileTable::new(vec![profile(&["north"], "1 North St")]);
        let event = fixtures::event_in_zones("e", 0.0, 5.0, &["street"]);
        assert!(table.resolve(&event).is_none());

        let unzoned = fixtures::event_in_zones("e", 0.0, 5.0, &[]);
        assert!(table.resolve(&unzoned).is_none());
    }
}
