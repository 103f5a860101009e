//! Video filter variants and the fixed-order filter graph assembler.
//!
//! Order is always crop -> scale/setdar/setsar -> rotation ->
//! deinterlace-or-interlace -> denoise, whatever order the user enabled them in.

use crate::engine::validate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A filter that renders to one or more comma-separated FFmpeg filter fragments.
pub trait FilterFragment {
    fn to_fragment(&self) -> String;
}

fn invalid(kind: &str, input: &str) -> ConfigError {
    ConfigError::InvalidFilter(format!("{kind}: '{input}'"))
}

/// Split `name=a:b:k=v` into its name and argument list.
/// Arguments keep their optional `key=` part.
fn split_filter<'a>(input: &'a str, name: &str) -> Option<Vec<(Option<&'a str>, &'a str)>> {
    let trimmed = input.trim();
    let body = match trimmed.split_once('=') {
        Some((head, rest)) if head == name => rest,
        _ if trimmed == name => "",
        _ => trimmed,
    };
    if body.is_empty() {
        return Some(Vec::new());
    }
    Some(
        body.split(':')
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (Some(k.trim()), v.trim()),
                None => (None, part.trim()),
            })
            .collect(),
    )
}

/// Resolve positional/keyed args against an ordered list of names.
fn named_args<'a>(
    args: &[(Option<&'a str>, &'a str)],
    names: &[&str],
) -> Option<Vec<Option<&'a str>>> {
    let mut out: Vec<Option<&str>> = vec![None; names.len()];
    for (idx, (key, value)) in args.iter().enumerate() {
        let slot = match key {
            Some(k) => names.iter().position(|n| n == k)?,
            None if idx < names.len() => idx,
            None => return None,
        };
        out[slot] = Some(*value);
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
    /// Omitted offsets let FFmpeg center the crop window
    pub x: Option<u32>,
    pub y: Option<u32>,
}

impl FilterFragment for Crop {
    fn to_fragment(&self) -> String {
        let mut out = format!("crop={}:{}", self.width, self.height);
        if self.x.is_some() || self.y.is_some() {
            out.push_str(&format!(":{}:{}", self.x.unwrap_or(0), self.y.unwrap_or(0)));
        }
        out
    }
}

impl FromStr for Crop {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let args = split_filter(s, "crop").ok_or_else(|| invalid("crop", s))?;
        let vals = named_args(&args, &["w", "h", "x", "y"]).ok_or_else(|| invalid("crop", s))?;
        let num = |v: Option<&str>| -> Result<Option<u32>, ConfigError> {
            v.map(|t| t.parse::<u32>().map_err(|_| invalid("crop", s)))
                .transpose()
        };
        let width = num(vals[0])?.ok_or_else(|| invalid("crop", s))?;
        let height = num(vals[1])?.ok_or_else(|| invalid("crop", s))?;
        if width == 0 || height == 0 {
            return Err(invalid("crop", s));
        }
        Ok(Crop {
            width,
            height,
            x: num(vals[2])?,
            y: num(vals[3])?,
        })
    }
}

/// Scale plus the display/sample aspect ratio filters that share its category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scale {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub dar: Option<String>,
    pub sar: Option<String>,
}

impl Scale {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.dar.is_none() && self.sar.is_none()
    }
}

impl FilterFragment for Scale {
    fn to_fragment(&self) -> String {
        let mut parts = Vec::new();
        let mut dims = Vec::new();
        if let Some(w) = self.width {
            dims.push(format!("w={w}"));
        }
        if let Some(h) = self.height {
            dims.push(format!("h={h}"));
        }
        if !dims.is_empty() {
            parts.push(format!("scale={}", dims.join(":")));
        }
        if let Some(dar) = &self.dar {
            parts.push(format!("setdar={dar}"));
        }
        if let Some(sar) = &self.sar {
            parts.push(format!("setsar={sar}"));
        }
        parts.join(",")
    }
}

pub(crate) fn valid_ratio(r: &str) -> bool {
    let parse_side = |t: &str| t.trim().parse::<f64>().map(|v| v > 0.0).unwrap_or(false);
    match r.split_once(['/', ':']) {
        Some((a, b)) => parse_side(a) && parse_side(b),
        None => parse_side(r),
    }
}

impl FromStr for Scale {
    type Err = ConfigError;

    /// Accepts `scale=w=1280:h=720`, `scale=1280:720`, `setdar=16/9`,
    /// `setsar=1/1` or any comma-joined combination of them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scale = Scale::default();
        for piece in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(ratio) = piece.strip_prefix("setdar=") {
                if !valid_ratio(ratio) {
                    return Err(invalid("setdar", piece));
                }
                scale.dar = Some(ratio.to_string());
            } else if let Some(ratio) = piece.strip_prefix("setsar=") {
                if !valid_ratio(ratio) {
                    return Err(invalid("setsar", piece));
                }
                scale.sar = Some(ratio.to_string());
            } else {
                let args = split_filter(piece, "scale").ok_or_else(|| invalid("scale", piece))?;
                let vals =
                    named_args(&args, &["w", "h"]).ok_or_else(|| invalid("scale", piece))?;
                let dim = |v: Option<&str>| -> Result<Option<i32>, ConfigError> {
                    v.map(|t| t.parse::<i32>().map_err(|_| invalid("scale", piece)))
                        .transpose()
                };
                scale.width = dim(vals[0])?;
                scale.height = dim(vals[1])?;
            }
        }
        if scale.is_empty() {
            return Err(invalid("scale", s));
        }
        Ok(scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
    UpsideDown,
    FlipHorizontal,
    FlipVertical,
}

impl FilterFragment for Rotation {
    fn to_fragment(&self) -> String {
        match self {
            Rotation::Clockwise => "transpose=1",
            Rotation::CounterClockwise => "transpose=2",
            Rotation::UpsideDown => "transpose=2,transpose=2",
            Rotation::FlipHorizontal => "hflip",
            Rotation::FlipVertical => "vflip",
        }
        .to_string()
    }
}

impl FromStr for Rotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transpose=1" | "cw" | "90" | "clockwise" => Ok(Rotation::Clockwise),
            "transpose=2" | "ccw" | "-90" | "270" | "counterclockwise" => {
                Ok(Rotation::CounterClockwise)
            }
            "transpose=2,transpose=2" | "180" => Ok(Rotation::UpsideDown),
            "hflip" => Ok(Rotation::FlipHorizontal),
            "vflip" => Ok(Rotation::FlipVertical),
            _ => Err(invalid("rotation", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOrder {
    TopFirst,
    BottomFirst,
}

impl FieldOrder {
    fn as_str(self) -> &'static str {
        match self {
            FieldOrder::TopFirst => "tff",
            FieldOrder::BottomFirst => "bff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deinterlacer {
    /// `yadif=mode:parity:deint`
    Yadif { mode: u8, parity: i8, deint: u8 },
    /// `w3fdif=filter=simple|complex:deint=all|interlaced`
    W3fdif { complex: bool, all_frames: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interlace {
    pub scan: FieldOrder,
    pub lowpass: bool,
}

/// Deinterlace and interlace share one slot, so at most one is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lacing {
    Deinterlace(Deinterlacer),
    Interlace(Interlace),
}

impl FilterFragment for Lacing {
    fn to_fragment(&self) -> String {
        match self {
            Lacing::Deinterlace(Deinterlacer::Yadif {
                mode,
                parity,
                deint,
            }) => format!("yadif={mode}:{parity}:{deint}"),
            Lacing::Deinterlace(Deinterlacer::W3fdif {
                complex,
                all_frames,
            }) => format!(
                "w3fdif=filter={}:deint={}",
                if *complex { "complex" } else { "simple" },
                if *all_frames { "all" } else { "interlaced" }
            ),
            Lacing::Interlace(il) => format!(
                "interlace=scan={}:lowpass={}",
                il.scan.as_str(),
                if il.lowpass { "linear" } else { "off" }
            ),
        }
    }
}

impl FromStr for Deinterlacer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t == "yadif" || t.starts_with("yadif=") {
            let args = split_filter(t, "yadif").ok_or_else(|| invalid("yadif", s))?;
            let vals = named_args(&args, &["mode", "parity", "deint"])
                .ok_or_else(|| invalid("yadif", s))?;
            let mode = vals[0].map_or(Ok(0), |v| v.parse()).map_err(|_| invalid("yadif", s))?;
            let parity = vals[1].map_or(Ok(-1), |v| v.parse()).map_err(|_| invalid("yadif", s))?;
            let deint = vals[2].map_or(Ok(0), |v| v.parse()).map_err(|_| invalid("yadif", s))?;
            if mode > 3 || !(-1..=1).contains(&parity) || deint > 1 {
                return Err(invalid("yadif", s));
            }
            Ok(Deinterlacer::Yadif {
                mode,
                parity,
                deint,
            })
        } else if t == "w3fdif" || t.starts_with("w3fdif=") {
            let args = split_filter(t, "w3fdif").ok_or_else(|| invalid("w3fdif", s))?;
            let vals =
                named_args(&args, &["filter", "deint"]).ok_or_else(|| invalid("w3fdif", s))?;
            let complex = match vals[0].unwrap_or("complex") {
                "complex" => true,
                "simple" => false,
                _ => return Err(invalid("w3fdif", s)),
            };
            let all_frames = match vals[1].unwrap_or("all") {
                "all" => true,
                "interlaced" => false,
                _ => return Err(invalid("w3fdif", s)),
            };
            Ok(Deinterlacer::W3fdif {
                complex,
                all_frames,
            })
        } else {
            Err(invalid("deinterlace", s))
        }
    }
}

impl FromStr for Interlace {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let args = split_filter(s, "interlace").ok_or_else(|| invalid("interlace", s))?;
        let vals =
            named_args(&args, &["scan", "lowpass"]).ok_or_else(|| invalid("interlace", s))?;
        let scan = match vals[0].unwrap_or("tff") {
            "tff" => FieldOrder::TopFirst,
            "bff" => FieldOrder::BottomFirst,
            _ => return Err(invalid("interlace", s)),
        };
        let lowpass = match vals[1].unwrap_or("linear") {
            "linear" | "1" | "complex" => true,
            "off" | "0" => false,
            _ => return Err(invalid("interlace", s)),
        };
        Ok(Interlace { scan, lowpass })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Denoise {
    Hqdn3d {
        luma_spatial: f64,
        chroma_spatial: f64,
        luma_tmp: f64,
        chroma_tmp: f64,
    },
    Nlmeans {
        strength: f64,
        patch: u32,
        research: u32,
    },
}

impl FilterFragment for Denoise {
    fn to_fragment(&self) -> String {
        match self {
            Denoise::Hqdn3d {
                luma_spatial,
                chroma_spatial,
                luma_tmp,
                chroma_tmp,
            } => format!("hqdn3d={luma_spatial}:{chroma_spatial}:{luma_tmp}:{chroma_tmp}"),
            Denoise::Nlmeans {
                strength,
                patch,
                research,
            } => format!("nlmeans=s={strength}:p={patch}:r={research}"),
        }
    }
}

impl FromStr for Denoise {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let float = |v: Option<&str>, default: f64| -> Result<f64, ConfigError> {
            match v {
                Some(v) => v
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .ok_or_else(|| invalid("denoise", s)),
                None => Ok(default),
            }
        };
        if t == "hqdn3d" || t.starts_with("hqdn3d=") {
            let args = split_filter(t, "hqdn3d").ok_or_else(|| invalid("hqdn3d", s))?;
            let vals = named_args(
                &args,
                &["luma_spatial", "chroma_spatial", "luma_tmp", "chroma_tmp"],
            )
            .ok_or_else(|| invalid("hqdn3d", s))?;
            Ok(Denoise::Hqdn3d {
                luma_spatial: float(vals[0], 4.0)?,
                chroma_spatial: float(vals[1], 3.0)?,
                luma_tmp: float(vals[2], 6.0)?,
                chroma_tmp: float(vals[3], 4.5)?,
            })
        } else if t == "nlmeans" || t.starts_with("nlmeans=") {
            let args = split_filter(t, "nlmeans").ok_or_else(|| invalid("nlmeans", s))?;
            let vals = named_args(&args, &["s", "p", "r"]).ok_or_else(|| invalid("nlmeans", s))?;
            let int = |v: Option<&str>, default: u32| -> Result<u32, ConfigError> {
                v.map_or(Ok(default), |v| v.parse().map_err(|_| invalid("nlmeans", s)))
            };
            Ok(Denoise::Nlmeans {
                strength: float(vals[0], 1.0)?,
                patch: int(vals[1], 7)?,
                research: int(vals[2], 15)?,
            })
        } else {
            Err(invalid("denoise", s))
        }
    }
}

/// The video filter selections of an options model, one slot per category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoFilters {
    pub crop: Option<Crop>,
    pub scale: Option<Scale>,
    pub rotation: Option<Rotation>,
    pub lacing: Option<Lacing>,
    pub denoise: Option<Denoise>,
}

impl VideoFilters {
    pub fn is_empty(&self) -> bool {
        assemble(self).is_empty()
    }
}

/// Build the `-vf` value. An empty string means no filter flag is emitted.
pub fn assemble(filters: &VideoFilters) -> String {
    let categories: [Option<&dyn FilterFragment>; 5] = [
        filters.crop.as_ref().map(|f| f as &dyn FilterFragment),
        filters.scale.as_ref().map(|f| f as &dyn FilterFragment),
        filters.rotation.as_ref().map(|f| f as &dyn FilterFragment),
        filters.lacing.as_ref().map(|f| f as &dyn FilterFragment),
        filters.denoise.as_ref().map(|f| f as &dyn FilterFragment),
    ];

    let mut graph = String::new();
    for fragment in categories.into_iter().flatten().map(|f| f.to_fragment()) {
        if fragment.is_empty() {
            continue;
        }
        graph.push_str(&fragment);
        graph.push(',');
    }
    graph.trim_end_matches(',').to_string()
}

impl fmt::Display for VideoFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&assemble(self))
    }
}
