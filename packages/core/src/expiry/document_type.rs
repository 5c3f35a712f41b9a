use std::fmt;

use serde::{Deserialize, Serialize};

/// Document kinds whose expiry is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    RoadTax,
    FitnessCertificate,
    TravelPermits,
    Emission,
    RcBook,
    Insurance,
}

/// Where the sweep finds the expiry date for a document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepResolution {
    /// Read from a column on the vehicle row.
    VehicleField,
    /// Kept in on-device storage by the client; the server never sees it.
    ClientSideOnly,
    /// No server-side source yet; only the upload hook notifies for these.
    NotBacked,
}

impl DocumentType {
    /// Sweep order.
    pub const ALL: [DocumentType; 6] = [
        DocumentType::RoadTax,
        DocumentType::FitnessCertificate,
        DocumentType::TravelPermits,
        DocumentType::Emission,
        DocumentType::RcBook,
        DocumentType::Insurance,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::RoadTax => "road_tax",
            DocumentType::FitnessCertificate => "fitness_certificate",
            DocumentType::TravelPermits => "travel_permits",
            DocumentType::Emission => "emission",
            DocumentType::RcBook => "rc_book",
            DocumentType::Insurance => "insurance",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::RoadTax => "Road Tax",
            DocumentType::FitnessCertificate => "Fitness Certificate",
            DocumentType::TravelPermits => "Travel Permits",
            DocumentType::Emission => "Emission Certificate",
            DocumentType::RcBook => "RC Book",
            DocumentType::Insurance => "Insurance",
        }
    }

    /// Name of the vehicle column backing this type, if any.
    pub fn vehicle_field(&self) -> Option<&'static str> {
        match self {
            DocumentType::Emission => Some("emission_expiry"),
            DocumentType::RcBook => Some("rc_expiry"),
            _ => None,
        }
    }

    pub fn sweep_resolution(&self) -> SweepResolution {
        match self {
            DocumentType::Emission | DocumentType::RcBook => SweepResolution::VehicleField,
            DocumentType::Insurance => SweepResolution::ClientSideOnly,
            DocumentType::RoadTax
            | DocumentType::FitnessCertificate
            | DocumentType::TravelPermits => SweepResolution::NotBacked,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_tracked_type() {
        for t in DocumentType::ALL {
            assert_eq!(DocumentType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn parse_rejects_untracked_types() {
        assert_eq!(DocumentType::parse("fuel"), None);
        assert_eq!(DocumentType::parse("Emission"), None);
        assert_eq!(DocumentType::parse(""), None);
    }

    #[test]
    fn sweep_order_is_stable() {
        let names: Vec<_> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            [
                "road_tax",
                "fitness_certificate",
                "travel_permits",
                "emission",
                "rc_book",
                "insurance"
            ]
        );
    }

    #[test]
    fn only_emission_and_rc_book_resolve_from_the_vehicle() {
        let backed: Vec<_> = DocumentType::ALL
            .into_iter()
            .filter(|t| t.sweep_resolution() == SweepResolution::VehicleField)
            .collect();
        assert_eq!(backed, [DocumentType::Emission, DocumentType::RcBook]);
        assert_eq!(DocumentType::Emission.vehicle_field(), Some("emission_expiry"));
        assert_eq!(DocumentType::RcBook.vehicle_field(), Some("rc_expiry"));
        assert_eq!(
            DocumentType::Insurance.sweep_resolution(),
            SweepResolution::ClientSideOnly
        );
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&DocumentType::FitnessCertificate).unwrap();
        assert_eq!(json, "\"fitness_certificate\"");
        let parsed: DocumentType = serde_json::from_str("\"rc_book\"").unwrap();
        assert_eq!(parsed, DocumentType::RcBook);
    }
}
