use shared::ClassLabel;
use std::str::FromStr;

/// Fixed guidance shown for one wear grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advisory {
    pub status: &'static str,
    pub emoji: &'static str,
    pub condition: &'static str,
    pub action: &'static str,
    pub urgency: &'static str,
    pub safety: &'static str,
    pub score: u8,
    pub timeline: &'static str,
    pub tips: &'static str,
}

const NEW: Advisory = Advisory {
    status: "✅ EXCELLENT CONDITION",
    emoji: "🟢",
    condition: "No visible wear - like new condition",
    action: "Continue normal use - no action needed",
    urgency: "NONE",
    safety: "COMPLETELY SAFE",
    score: 100,
    timeline: "No replacement needed",
    tips: "Continue current care routine to maintain condition",
};

const MINOR: Advisory = Advisory {
    status: "👀 LIGHT WEAR DETECTED",
    emoji: "🟡",
    condition: "Minor surface scratches or light wear patterns",
    action: "Monitor condition - safe to continue using",
    urgency: "LOW",
    safety: "SAFE TO USE",
    score: 75,
    timeline: "6-12 months (monitor regularly)",
    tips: "Use wooden or silicone utensils to prevent further scratching",
};

const MODERATE: Advisory = Advisory {
    status: "⚠️ MODERATE WEAR",
    emoji: "🟠",
    condition: "Noticeable coating damage or wear patterns",
    action: "Plan replacement within 2-3 months",
    urgency: "MEDIUM",
    safety: "USE WITH CAUTION",
    score: 50,
    timeline: "2-3 months recommended",
    tips: "Avoid high heat cooking and consider replacing soon",
};

const SEVERE: Advisory = Advisory {
    status: "🚨 SEVERE DAMAGE",
    emoji: "🔴",
    condition: "Heavy coating loss, deep scratches, or significant damage",
    action: "REPLACE IMMEDIATELY - may affect food safety",
    urgency: "HIGH",
    safety: "POTENTIALLY UNSAFE",
    score: 25,
    timeline: "IMMEDIATE replacement required",
    tips: "Stop using immediately - damaged coating may be harmful",
};

pub fn advisory_for(label: ClassLabel) -> &'static Advisory {
    match label {
        ClassLabel::New => &NEW,
        ClassLabel::Minor => &MINOR,
        ClassLabel::Moderate => &MODERATE,
        ClassLabel::Severe => &SEVERE,
    }
}

/// Looks up a label by name, for callers holding a label string from outside
/// this crate (a model's own label file, a stored report). Unknown names get
/// the moderate advisory, so the lookup is total.
pub fn advisory_for_name(name: &str) -> &'static Advisory {
    match ClassLabel::from_str(name) {
        Ok(label) => advisory_for(label),
        Err(_) => {
            log::warn!("Unknown class label {:?}, using moderate advisory", name);
            &MODERATE
        }
    }
}
