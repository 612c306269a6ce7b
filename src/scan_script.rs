//! Default progressive scan planning.
//!
//! The planner turns a progressive level and the frame's sampling
//! geometry into the concrete scan list. Level 0 is a single sequential
//! scan, level 1 a simple DC-then-AC progression with one refinement
//! pass, level 2 and above the default multi-pass script.

use crate::error::{Error, Result};
use crate::types::ScanInfo;

/// One scan template before expansion over components.
struct ScanTemplate {
    ss: u8,
    se: u8,
    ah: u8,
    al: u8,
    interleaved: bool,
}

const fn tpl(ss: u8, se: u8, ah: u8, al: u8, interleaved: bool) -> ScanTemplate {
    ScanTemplate {
        ss,
        se,
        ah,
        al,
        interleaved,
    }
}

/// Builds the default scan script.
///
/// Each interleaved template yields one scan covering all components in
/// order; each non-interleaved template yields one scan per component.
#[must_use]
pub fn plan_scans(progressive_level: i32, max_shift: u32, num_components: usize) -> Vec<ScanInfo> {
    let subsampled = max_shift > 0;
    let templates: Vec<ScanTemplate> = if progressive_level == 0 {
        vec![tpl(0, 63, 0, 0, true)]
    } else if progressive_level == 1 {
        vec![
            tpl(0, 0, 0, 0, subsampled),
            tpl(1, 63, 0, 1, false),
            tpl(1, 63, 1, 0, false),
        ]
    } else {
        vec![
            tpl(0, 0, 0, 0, subsampled),
            tpl(1, 2, 0, 0, false),
            tpl(3, 63, 0, 2, false),
            tpl(3, 63, 2, 1, false),
            tpl(3, 63, 1, 0, false),
        ]
    };

    let mut scans = Vec::new();
    let all: Vec<u8> = (0..num_components as u8).collect();
    for t in &templates {
        if t.interleaved {
            scans.push(ScanInfo::new(&all, t.ss, t.se, t.ah, t.al));
        } else {
            for &c in &all {
                scans.push(ScanInfo::new(&[c], t.ss, t.se, t.ah, t.al));
            }
        }
    }
    scans
}

/// Checks the structural rules a user-supplied scan script must satisfy
/// before the bitstream writer will accept it.
pub fn validate_scan_script(scans: &[ScanInfo], num_components: usize) -> Result<()> {
    if scans.is_empty() {
        return Err(Error::InvalidScanScript {
            reason: "scan script must contain at least one scan",
        });
    }
    let mut dc_done = [false; 4];
    for scan in scans {
        let comps = scan.components();
        if comps.is_empty() || comps.len() > 4 {
            return Err(Error::InvalidScanScript {
                reason: "scans must cover between 1 and 4 components",
            });
        }
        if scan.se > 63 || scan.ss > scan.se {
            return Err(Error::InvalidScanScript {
                reason: "spectral selection out of range",
            });
        }
        if scan.ss > 0 && comps.len() > 1 {
            return Err(Error::InvalidScanScript {
                reason: "AC scans must cover exactly one component",
            });
        }
        for (i, &c) in comps.iter().enumerate() {
            if c as usize >= num_components {
                return Err(Error::InvalidScanScript {
                    reason: "component index out of range",
                });
            }
            if i > 0 && comps[i] <= comps[i - 1] {
                return Err(Error::InvalidScanScript {
                    reason: "components must be listed in ascending order",
                });
            }
            if scan.ss == 0 && scan.ah == 0 {
                dc_done[c as usize] = true;
            }
            if scan.ss > 0 && !dc_done[c as usize] {
                return Err(Error::InvalidScanScript {
                    reason: "AC scan before DC scan for a component",
                });
            }
        }
    }
    Ok(())
}
