//! Built-in catalog used when the config file declares no personas,
//! servers, or frameworks of its own.

use clarion_core::{CapabilityAffinity, CapabilityServer, FrameworkDefinition, Persona};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn affinities(pairs: &[(&str, &str)]) -> Vec<CapabilityAffinity> {
    pairs
        .iter()
        .map(|(capability, server_id)| CapabilityAffinity {
            capability: (*capability).into(),
            server_id: (*server_id).into(),
        })
        .collect()
}

pub(crate) fn personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "diego".into(),
            display_name: "Diego".into(),
            domain: "Engineering Leadership".into(),
            activation_keywords: strings(&[
                "team",
                "teams",
                "engineering",
                "leadership",
                "restructure",
                "organization",
                "reorg",
                "hiring",
                "process",
                "delivery",
            ]),
            capability_affinities: affinities(&[
                ("systematic_analysis", "sequential"),
                ("framework_patterns", "context7"),
            ]),
            activation_threshold: 0.15,
        },
        Persona {
            id: "camille".into(),
            display_name: "Camille".into(),
            domain: "Strategic Technology".into(),
            activation_keywords: strings(&[
                "strategy",
                "strategic",
                "technology",
                "executive",
                "vision",
                "roadmap",
                "initiative",
                "competitive",
                "innovation",
                "transformation",
            ]),
            capability_affinities: affinities(&[
                ("systematic_analysis", "sequential"),
                ("framework_patterns", "context7"),
            ]),
            activation_threshold: 0.15,
        },
        Persona {
            id: "rachel".into(),
            display_name: "Rachel".into(),
            domain: "Design Systems Strategy".into(),
            activation_keywords: strings(&[
                "design",
                "design system",
                "components",
                "ux",
                "accessibility",
                "consistency",
                "ui",
                "usability",
                "tokens",
                "adoption",
            ]),
            capability_affinities: affinities(&[
                ("framework_patterns", "context7"),
                ("diagram_generation", "magic"),
            ]),
            activation_threshold: 0.15,
        },
        Persona {
            id: "alvaro".into(),
            display_name: "Alvaro".into(),
            domain: "Platform Investment Strategy".into(),
            activation_keywords: strings(&[
                "investment",
                "roi",
                "budget",
                "business value",
                "cost",
                "revenue",
                "capital",
                "funding",
                "stakeholders",
                "platform investment",
            ]),
            capability_affinities: affinities(&[("systematic_analysis", "sequential")]),
            activation_threshold: 0.15,
        },
        Persona {
            id: "martin".into(),
            display_name: "Martin".into(),
            domain: "Platform Architecture".into(),
            activation_keywords: strings(&[
                "architecture",
                "platform",
                "microservices",
                "technical debt",
                "evolution",
                "system",
                "api",
                "scalability",
                "migration",
                "design patterns",
            ]),
            capability_affinities: affinities(&[
                ("framework_patterns", "context7"),
                ("systematic_analysis", "sequential"),
            ]),
            activation_threshold: 0.15,
        },
    ]
}

pub(crate) fn servers() -> Vec<CapabilityServer> {
    vec![
        CapabilityServer {
            id: "sequential".into(),
            display_name: "Systematic Analysis".into(),
            capabilities: strings(&["systematic_analysis", "organizational_analysis"]),
            endpoint: "local:sequential".into(),
            timeout_ms: 5000,
            max_retries: 1,
        },
        CapabilityServer {
            id: "context7".into(),
            display_name: "Framework Patterns".into(),
            capabilities: strings(&["framework_patterns", "methodology_lookup"]),
            endpoint: "local:context7".into(),
            timeout_ms: 5000,
            max_retries: 1,
        },
        CapabilityServer {
            id: "magic".into(),
            display_name: "Visual Generation".into(),
            capabilities: strings(&["diagram_generation"]),
            endpoint: "local:magic".into(),
            timeout_ms: 5000,
            max_retries: 0,
        },
        CapabilityServer {
            id: "playwright".into(),
            display_name: "Validation Testing".into(),
            capabilities: strings(&["validation"]),
            endpoint: "local:playwright".into(),
            timeout_ms: 5000,
            max_retries: 0,
        },
    ]
}

pub(crate) fn frameworks() -> Vec<FrameworkDefinition> {
    let framework = |id: &str, name: &str, terms: &[&str]| FrameworkDefinition {
        id: id.into(),
        name: name.into(),
        terms: strings(terms),
    };
    vec![
        framework(
            "team_topologies",
            "Team Topologies",
            &["stream-aligned", "platform team", "enabling team", "cognitive load"],
        ),
        framework(
            "good_strategy_bad_strategy",
            "Good Strategy Bad Strategy",
            &["diagnosis", "guiding policy", "coherent action", "kernel"],
        ),
        framework(
            "wrap",
            "WRAP Decision Framework",
            &["widen your options", "reality-test", "attain distance", "prepare to be wrong"],
        ),
        framework(
            "capital_allocation",
            "Capital Allocation Framework",
            &["capital allocation", "return on investment", "opportunity cost", "portfolio"],
        ),
        framework(
            "crucial_conversations",
            "Crucial Conversations",
            &["crucial conversation", "safety", "mutual purpose", "shared pool of meaning"],
        ),
        framework(
            "accelerate",
            "Accelerate (DORA metrics)",
            &["deployment frequency", "lead time", "change failure rate", "time to restore"],
        ),
        framework(
            "design_system_maturity",
            "Design System Maturity Model",
            &["design system", "adoption", "governance", "maturity"],
        ),
    ]
}

pub(crate) fn strategic_terms() -> Vec<String> {
    strings(&[
        "strategy",
        "strategic",
        "restructure",
        "reorganize",
        "reorg",
        "initiative",
        "roadmap",
        "transformation",
        "platform",
        "investment",
        "prioritize",
        "prioritization",
        "vision",
        "long-term",
        "scaling",
        "organizational",
    ])
}

pub(crate) fn multi_stakeholder_terms() -> Vec<String> {
    strings(&[
        "teams",
        "stakeholders",
        "cross-functional",
        "cross-team",
        "departments",
        "alignment",
        "coordination",
        "multiple teams",
        "across",
        "organization-wide",
        "partners",
        "dependencies",
    ])
}

pub(crate) fn framework_applicability_terms() -> Vec<String> {
    strings(&[
        "how should",
        "what's the best way",
        "what is the best way",
        "framework",
        "approach",
        "trade-off",
        "trade-offs",
        "tradeoffs",
        "decide",
        "decision",
        "evaluate",
        "options",
        "best practice",
        "methodology",
    ])
}

pub(crate) fn elevated_audience_terms() -> Vec<String> {
    strings(&[
        "executive",
        "executives",
        "board",
        "vp",
        "cto",
        "ceo",
        "c-suite",
        "leadership team",
        "investors",
        "steering committee",
    ])
}
