//! Column names of the POSDATA and PNAME spreadsheets.

// POSDATA identifiers
pub const OBJECT_ID: &str = "OBJECTID";
pub const SMI_CODE: &str = "SMI_CODE";
pub const POSITION_CODE: &str = "TRS_POS_CODE";
pub const HIRE_YEAR: &str = "HIRE_YEAR";

// Derived
pub const TENURE: &str = "Tenure";
pub const TENURE_DISTRIBUTION: &str = "Tenure Distribution";

// PNAME
pub const JOB_CODE: &str = "Job Code";
pub const FUNCTION: &str = "Function";
pub const SUB_FUNCTION: &str = "Sub-Function";
pub const CAREER_LEVEL_PC: &str = "Career Level by PC";
pub const CL_SALES: &str = "CL-Sales";
pub const CAREER_LEVEL_SALES: &str = "Career Level-Sales";
pub const COMMENTS: &str = "Comments";

/// `Comments` value marking a job code whose positions are dropped.
pub const EXCLUSION_MARKER: &str = "N";

/// Fill value for null reference attributes before the join.
pub const REFERENCE_FILL: &str = "NA";

// Ratios and compensation
pub const BON_TPER: &str = "BON_TPER";
pub const INCENT_TPER: &str = "INCENT_TPER";
pub const OTHBON_TPER: &str = "OTHBON_TPER";
pub const BON_APER: &str = "BON_APER";
pub const INCENT_APER: &str = "INCENT_APER";
pub const OTHBON_APER: &str = "OTHBON_APER";

pub const CMP1: &str = "CMP1";
pub const INCENT_TGT: &str = "INCENT_TGT";
pub const BON_TGT: &str = "BON_TGT";
pub const CMP3TGT_NEW: &str = "CMP3TGT_NEW";
pub const CMP3ACT: &str = "CMP3ACT";
pub const CMP5: &str = "CMP5";

/// Percentage columns stored as whole numbers in POSDATA (15 means 15%).
pub const RATIO_COLUMNS: [&str; 6] = [
    BON_TPER,
    INCENT_TPER,
    OTHBON_TPER,
    BON_APER,
    INCENT_APER,
    OTHBON_APER,
];

pub const COMPENSATION_COLUMNS: [&str; 6] = [CMP1, INCENT_TGT, BON_TGT, CMP3TGT_NEW, CMP3ACT, CMP5];

/// Identifier columns kept in the cleaned output, derived tenure columns included.
pub const BASIC_INFO_COLUMNS: [&str; 11] = [
    OBJECT_ID,
    "EXCL_PML",
    SMI_CODE,
    "ORGDATA_CPY_NAME",
    "LOCATION_CN_MLS",
    "YOUR_TITLE",
    POSITION_CODE,
    "TRS_PNAME_POS_TITLE",
    "TRS_POS_CLASS",
    TENURE,
    TENURE_DISTRIBUTION,
];

/// PNAME columns joined onto POSDATA (the join key first).
pub const PNAME_KEEP_COLUMNS: [&str; 6] = [
    JOB_CODE,
    FUNCTION,
    SUB_FUNCTION,
    CAREER_LEVEL_PC,
    CL_SALES,
    CAREER_LEVEL_SALES,
];

/// Metrics offered for compensation group-bys.
pub const COMPENSATION_METRICS: [&str; 8] = [
    "CMP1",
    "CMP2",
    "CMP3ACT",
    "CMP3TGT_NEW",
    "CMP4",
    "CMP5_NOLTI",
    "CMP5",
    "CMP5TGT_NOLTI",
];

/// Table labels used in error messages.
pub const POSDATA: &str = "POSDATA";
pub const PNAME: &str = "PNAME";
