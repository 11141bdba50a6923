//! Links to the Backyard Worlds WiseView viewer.
//!
//! Pure string formatting; this service never calls the viewer itself.

use crate::candidate::Coordinates;

const WISEVIEW_BASE: &str = "http://byw.tools/wiseview";

/// Fixed display parameters appended after the position.
const WISEVIEW_PARAMS: &str = "size=176&band=2&speed=234.62&minbright=-2.3497\
&maxbright=963.1413&window=0.09958&diff_window=1&linear=1&color=&zoom=10\
&border=0&gaia=0&invert=0&maxdyr=0&scandir=0&neowise=0&diff=0&outer_epochs=0\
&unique_window=1&smooth_scan=0&shift=0&pmra=0&pmdec=0&synth_a=0&synth_a_sub=0\
&synth_a_ra=&synth_a_dec=&synth_a_w1=&synth_a_w2=&synth_a_pmra=0\
&synth_a_pmdec=0&synth_a_mjd=&synth_b=0&synth_b_sub=0&synth_b_ra=\
&synth_b_dec=&synth_b_w1=&synth_b_w2=&synth_b_pmra=0&synth_b_pmdec=0\
&synth_b_mjd=";

/// WiseView URL centred on `coords`.
pub fn wiseview_url(coords: Coordinates) -> String {
  format!(
    "{WISEVIEW_BASE}#ra={}&dec={}&{WISEVIEW_PARAMS}",
    coords.ra, coords.dec
  )
}
