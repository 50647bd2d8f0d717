//! Flow definitions: the scripted question sequences and their personas.
//!
//! Pure data. Each flow pairs a persona instruction with an ordered list of
//! steps and the wording used when the flow completes and is synthesized.

use serde::{Deserialize, Serialize};

/// One scripted question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStep {
    /// Answer key, e.g. `"climate"`.
    pub key: &'static str,
    /// Question shown to the user.
    pub prompt: &'static str,
}

const fn step(key: &'static str, prompt: &'static str) -> FlowStep {
    FlowStep { key, prompt }
}

/// Which scripted flow a dialogue runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Material,
    House,
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Material => write!(f, "material"),
            Self::House => write!(f, "house"),
        }
    }
}

/// A complete flow definition.
#[derive(Debug)]
pub struct Flow {
    pub kind: FlowKind,
    /// Human-readable name, used in headings.
    pub title: &'static str,
    /// Persona instruction sent as the system message.
    pub persona: &'static str,
    pub steps: &'static [FlowStep],
    /// Assistant message appended once every step is answered.
    pub completion_notice: &'static str,
    /// First line of the synthesis summary.
    pub summary_header: &'static str,
    /// Instruction describing the shape of the final output.
    pub task: &'static str,
}

impl Flow {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`, if the flow has one.
    pub fn step(&self, index: usize) -> Option<&'static FlowStep> {
        self.steps.get(index)
    }

    /// Position of the step with answer key `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.key == key)
    }
}

impl FlowKind {
    /// The static definition for this flow.
    pub fn flow(self) -> &'static Flow {
        match self {
            Self::Material => &MATERIAL_FLOW,
            Self::House => &HOUSE_FLOW,
        }
    }
}

pub const MATERIAL_PERSONA: &str = "\
You are an expert design-material consultant with knowledge of architecture, interior/exterior finishes, materials science, climate-appropriate materials, sustainability, local availability, cost tiers, installation and maintenance.

Rules:
- Ask only ONE question at a time and wait for the user's answer before asking the next.
- Validate user inputs. If unclear, ask a short clarifying question.
- When user is unsure, offer 2-3 useful options and explain trade-offs briefly.
- Use climate logic (humidity, temperature range, UV, freeze-thaw, salt air).
- Use style logic and room function to recommend materials.
- Provide local-friendly alternatives and note where materials may have availability issues.
- End final recommendation with a short actionable checklist for sourcing, installation and maintenance.";

static MATERIAL_STEPS: [FlowStep; 10] = [
    step(
        "area_type",
        "Are we selecting materials for interior, exterior, or both? (reply: interior / exterior / both)",
    ),
    step(
        "country",
        "Which country is this project located in? (e.g., India, Japan, USA)",
    ),
    step(
        "room",
        "Which specific room or area? (e.g., Living room, Kitchen, Façade, Patio). If exterior, reply 'exterior'.",
    ),
    step(
        "style",
        "What design style are you aiming for? (modern, minimalist, rustic, traditional, Mediterranean, Scandinavian, tropical)",
    ),
    step(
        "climate",
        "What climate/seasonal conditions should we consider? (hot-dry, hot-humid, temperate, cold, coastal/salty-air, monsoon). Type 'infer' to let the assistant infer from country.",
    ),
    step(
        "mood",
        "What mood or emotion should the space evoke? (calm, energetic, cozy, luxurious, airy)",
    ),
    step(
        "color",
        "Preferred/dominant color palette? (neutrals, warm tones, cool tones, bold accents, natural wood)",
    ),
    step(
        "constraints",
        "Any constraints or priorities? (budget: low/medium/premium; sustainability: yes/no; low-maintenance: yes/no; pets/children: yes/no)",
    ),
    step(
        "sun_moisture",
        "Sunlight/exposure & moisture details? (direct sun, shaded, intermittent wetting, constant humidity)",
    ),
    step(
        "substrate",
        "Optional: Approximate area & substrates (concrete, wood frame, brick) or 'skip'",
    ),
];

pub const HOUSE_PERSONA: &str = "\
You are HouseBuild Planner AI, an expert residential planning assistant. You help users plan a realistic and thoughtful house layout based on needs, land size, family size, lifestyle, budget and location.

Responsibilities & Rules:
- Ask one question at a time.
- Understand needs clearly before suggesting plans.
- Provide practical house layout ideas: layout structure, floor planning, room placements, ventilation strategy, sunlight direction logic, roofing suggestions, and material recommendations.
- Provide 2–3 planning options when requested (Economy | Mid-range | Premium or similar).
- Do NOT provide engineering or structural safety instructions or construction codes.
- Keep responses concise, tailored and realistic.";

static HOUSE_STEPS: [FlowStep; 15] = [
    step("purpose", "Are we planning a new house or modifying an existing one?"),
    step("location", "Which country and city is the house located in?"),
    step(
        "plot_size",
        "What is your land/plot size? (e.g., 30x40 ft, 40x60 ft, 120 sq yards, 2000 sq ft)",
    ),
    step(
        "plot_facing",
        "Which direction is your plot facing? (North, East, South, West, Not sure)",
    ),
    step(
        "floors",
        "How many floors do you want? (Single floor, Duplex, Ground+1, Ground+2)",
    ),
    step(
        "family",
        "How many people will live in this house and what are their needs?",
    ),
    step(
        "rooms",
        "What rooms do you need? (Living, Bedrooms, Kitchen, Dining, Study, Parking, Garden, etc.)",
    ),
    step("kitchen", "Do you prefer open kitchen or closed kitchen?"),
    step(
        "style",
        "What style do you prefer? (Modern, Minimalist, Traditional, Contemporary, Scandinavian, Mediterranean, Vastu)",
    ),
    step(
        "climate",
        "What is the climate in your location? (Hot, Humid, Rainy, Cold, Mixed)",
    ),
    step(
        "materials_pref",
        "Any material preferences for walls/floors/roofing? (Brick, Concrete, Wood, Tiles, Stone, No preference)",
    ),
    step(
        "ventilation",
        "Do you want maximum natural light & ventilation, or more privacy-focused design?",
    ),
    step(
        "budget",
        "What is your budget style? (Economy, Mid-range, Premium)",
    ),
    step(
        "special",
        "Any special requirements (Vastu, eco-friendly, smart home, wheelchair-friendly, rental portion)?",
    ),
    step(
        "final_choice",
        "Would you like one detailed plan or 2–3 plan options? (reply: 1 or 2/3)",
    ),
];

static MATERIAL_FLOW: Flow = Flow {
    kind: FlowKind::Material,
    title: "Material selection",
    persona: MATERIAL_PERSONA,
    steps: &MATERIAL_STEPS,
    completion_notice: "Thank you. I'll now prepare material recommendations based on your answers. Use /finalize to generate the final output.",
    summary_header: "Collected inputs:",
    task: "Using the collected inputs, produce a concise ranked list (top 5) of recommended materials and finishes. \
For each recommended material include: short reason, climate/durability note, and one-line implementation note. \
Finish with a short actionable checklist for sourcing, installation and maintenance (5-8 bullets). Keep concise.",
};

static HOUSE_FLOW: Flow = Flow {
    kind: FlowKind::House,
    title: "Layout planning (HouseBuild Planner)",
    persona: HOUSE_PERSONA,
    steps: &HOUSE_STEPS,
    completion_notice: "Thank you. I'll now prepare the house layout plan based on your answers. Use /finalize to generate the final output.",
    summary_header: "Collected inputs for house planning:",
    task: "Using these inputs, produce a realistic house layout plan including layout structure, floor distribution, room placement logic, ventilation & sunlight direction logic, roofing suggestions, and material recommendations. \
Provide 2 planning options if the user requested multiple. Keep it practical and concise. Do NOT provide structural/engineering instructions.",
};
