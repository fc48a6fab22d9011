//! Instruction templates sent to the image model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

const FILL_PREFIX: &str = "Replace the masked (red) area in this image";
const FILL_DEFAULT: &str = "with appropriate content that matches the rest of the image.";

/// Inspiration prompts offered by the generator
pub const SAMPLE_PROMPTS: [&str; 5] = [
    "A serene sunset over a mountain lake with reflections of pink and orange clouds",
    "A futuristic cityscape with flying vehicles and holographic billboards",
    "A magical forest with bioluminescent plants and mystical creatures",
    "An astronaut standing on an alien planet with two moons in the sky",
    "A cozy coffee shop interior with rain falling outside the windows",
];

/// Style filters backed by the image model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AiFilter {
    Daytime,
    Night,
    Autumn,
    Winter,
    Summer,
    Vintage,
    Noir,
    Hdr,
    InfrastructureAging,
}

impl AiFilter {
    pub const ALL: [AiFilter; 9] = [
        AiFilter::Daytime,
        AiFilter::Night,
        AiFilter::Autumn,
        AiFilter::Winter,
        AiFilter::Summer,
        AiFilter::Vintage,
        AiFilter::Noir,
        AiFilter::Hdr,
        AiFilter::InfrastructureAging,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AiFilter::Daytime => "daytime",
            AiFilter::Night => "night",
            AiFilter::Autumn => "autumn",
            AiFilter::Winter => "winter",
            AiFilter::Summer => "summer",
            AiFilter::Vintage => "vintage",
            AiFilter::Noir => "noir",
            AiFilter::Hdr => "hdr",
            AiFilter::InfrastructureAging => "infrastructure-aging",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AiFilter::Daytime => "Daylight",
            AiFilter::Night => "Night",
            AiFilter::Autumn => "Autumn",
            AiFilter::Winter => "Winter",
            AiFilter::Summer => "Summer",
            AiFilter::Vintage => "Vintage",
            AiFilter::Noir => "Film Noir",
            AiFilter::Hdr => "HDR",
            AiFilter::InfrastructureAging => "Infrastructure Aging",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AiFilter::Daytime => "Bright, clear daylight effect",
            AiFilter::Night => "Night time ambiance",
            AiFilter::Autumn => "Warm autumn colors",
            AiFilter::Winter => "Cold winter atmosphere",
            AiFilter::Summer => "Vibrant summer feel",
            AiFilter::Vintage => "Classic retro film look",
            AiFilter::Noir => "High contrast black & white",
            AiFilter::Hdr => "Enhanced dynamic range",
            AiFilter::InfrastructureAging => "Simulates aging and weathering of infrastructure",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            AiFilter::Daytime => {
                "Transform this image to look like it was taken during bright daylight."
            }
            AiFilter::Night => {
                "Transform this image to look like it was taken at night with moonlight."
            }
            AiFilter::Autumn => "Apply autumn colors and atmosphere to this image.",
            AiFilter::Winter => {
                "Make this image look like it was taken in winter with a cold atmosphere."
            }
            AiFilter::Summer => {
                "Apply a vibrant summer feel to this image with warm, bright colors."
            }
            AiFilter::Vintage => {
                "Transform this image to have a vintage, retro film look from the 1970s."
            }
            AiFilter::Noir => {
                "Convert this image to black and white with high contrast like film noir."
            }
            AiFilter::Hdr => {
                "Enhance this image with HDR effects for vibrant colors and high dynamic range."
            }
            AiFilter::InfrastructureAging => {
                "Transform this infrastructure to look aged, weathered, and deteriorated over several decades. Add rust, cracks, wear and tear, and signs of neglect."
            }
        }
    }
}

impl fmt::Display for AiFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AiFilter {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AiFilter::ALL
            .into_iter()
            .find(|f| f.id() == s)
            .ok_or_else(|| EditorError::invalid(format!("Unknown filter: {}", s)))
    }
}

/// Filter template followed by optional user text
pub fn filter_instruction(filter: AiFilter, extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("{} {}", filter.instruction(), extra),
        None => filter.instruction().to_string(),
    }
}

pub fn fill_instruction(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        format!("{} {}", FILL_PREFIX, FILL_DEFAULT)
    } else {
        format!("{} with {}", FILL_PREFIX, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_ids_round_trip() {
        for filter in AiFilter::ALL {
            assert_eq!(filter.id().parse::<AiFilter>().unwrap(), filter);
        }
        assert!("sepia".parse::<AiFilter>().is_err());
        assert_eq!(
            serde_json::to_string(&AiFilter::InfrastructureAging).unwrap(),
            "\"infrastructure-aging\""
        );
    }

    #[test]
    fn test_filter_instruction_appends_prompt() {
        assert_eq!(
            filter_instruction(AiFilter::Autumn, Some("with falling leaves")),
            "Apply autumn colors and atmosphere to this image. with falling leaves"
        );
        assert_eq!(
            filter_instruction(AiFilter::Autumn, Some("  ")),
            AiFilter::Autumn.instruction()
        );
    }

    #[test]
    fn test_fill_instruction() {
        assert_eq!(
            fill_instruction("a red balloon"),
            "Replace the masked (red) area in this image with a red balloon"
        );
        assert_eq!(
            fill_instruction(""),
            "Replace the masked (red) area in this image with appropriate content that matches the rest of the image."
        );
    }
}
