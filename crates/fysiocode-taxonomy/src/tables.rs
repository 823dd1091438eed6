//! Static DCSPH-style segment tables.
//!
//! A diagnosis code is four digits: the first two select a body location,
//! the last two a pathology class. Both tables are fixed at compile time;
//! the table is read-only after process start.

/// Body-location segments (first two digits).
pub const LOCATIONS: &[(&str, &str)] = &[
    ("10", "Hoofd"),
    ("11", "Aangezicht/kaak"),
    ("20", "Schouderregio"),
    ("21", "Schoudergewricht"),
    ("22", "Bovenarm"),
    ("23", "Elleboog"),
    ("24", "Onderarm"),
    ("25", "Pols"),
    ("26", "Hand/vingers"),
    ("30", "Cervicale wervelkolom"),
    ("31", "Cervicothoracale overgang"),
    ("32", "Thoracale wervelkolom"),
    ("33", "Ribben/sternum"),
    ("34", "Lumbale wervelkolom"),
    ("35", "Lumbosacrale overgang"),
    ("36", "Bekken/SI-gewricht"),
    ("70", "Heupregio"),
    ("71", "Bovenbeen"),
    ("73", "Onderbeen"),
    ("74", "Enkel"),
    ("75", "Voet/tenen"),
    ("79", "Knie"),
];

/// Pathology segments (last two digits).
pub const PATHOLOGIES: &[(&str, &str)] = &[
    ("01", "Artrose"),
    ("02", "Artritis"),
    ("20", "Tendinopathie"),
    ("21", "Bursitis"),
    ("22", "Capsulitis"),
    ("26", "Myalgie/spierhypertonie"),
    ("27", "Spier- of peesruptuur"),
    ("31", "Distorsie"),
    ("32", "Luxatie"),
    ("36", "Fractuur (nabehandeling)"),
    ("38", "Contusie"),
    ("70", "Radiculair syndroom"),
    ("71", "Perifere zenuwcompressie"),
    ("90", "Aspecifieke klachten"),
];
