//! Service catalog shared by the agent tools and the system prompts

/// One offered service
#[derive(Debug, Clone, Copy)]
pub struct Service {
    pub id: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
    /// Indicative price range in USD
    pub price_from: u32,
    pub price_to: u32,
    /// Typical delivery time in weeks
    pub weeks_from: u32,
    pub weeks_to: u32,
}

pub const SERVICES: &[Service] = &[
    Service {
        id: "web",
        name: "Web applications",
        summary: "Custom web apps and marketing sites built with modern frameworks",
        price_from: 8_000,
        price_to: 40_000,
        weeks_from: 4,
        weeks_to: 12,
    },
    Service {
        id: "mobile",
        name: "Mobile apps",
        summary: "Cross-platform iOS and Android apps",
        price_from: 15_000,
        price_to: 60_000,
        weeks_from: 8,
        weeks_to: 16,
    },
    Service {
        id: "ai",
        name: "AI integration",
        summary: "Chatbots, agents, voice assistants and retrieval over your own data",
        price_from: 10_000,
        price_to: 50_000,
        weeks_from: 4,
        weeks_to: 10,
    },
    Service {
        id: "automation",
        name: "Workflow automation",
        summary: "API integrations and automated back-office workflows",
        price_from: 5_000,
        price_to: 25_000,
        weeks_from: 2,
        weeks_to: 8,
    },
    Service {
        id: "consulting",
        name: "Technical consulting",
        summary: "Architecture reviews, AI strategy and team mentoring",
        price_from: 2_000,
        price_to: 15_000,
        weeks_from: 1,
        weeks_to: 4,
    },
];

/// Look up a service by id or name, case-insensitively
pub fn find(query: &str) -> Option<&'static Service> {
    let query = query.trim().to_lowercase();
    SERVICES
        .iter()
        .find(|s| s.id == query || s.name.to_lowercase() == query)
}

/// One line per service, for prompts
pub fn summary_lines() -> String {
    SERVICES
        .iter()
        .map(|s| {
            format!(
                "- {} ({}): {}. Typically ${}-${}, {}-{} weeks.",
                s.name, s.id, s.summary, s.price_from, s.price_to, s.weeks_from, s.weeks_to
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_id_or_name() {
        assert_eq!(find("AI").map(|s| s.id), Some("ai"));
        assert_eq!(find(" Mobile apps ").map(|s| s.id), Some("mobile"));
        assert!(find("blockchain").is_none());
    }

    #[test]
    fn test_ranges_are_ordered() {
        for s in SERVICES {
            assert!(s.price_from <= s.price_to, "{}", s.id);
            assert!(s.weeks_from <= s.weeks_to, "{}", s.id);
        }
    }
}
