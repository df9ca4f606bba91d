//! Pinned face-mesh index table.
//!
//! Every measurement in this crate reads fixed indices of the 468-point dense
//! face mesh (478 with the refined iris points). The mapping is specific to
//! that upstream model: a different landmark model needs a new table with a
//! new [`CONVENTION`] tag, not edits to these constants.

/// Version tag of the index convention below.
pub const CONVENTION: &str = "face-mesh-468/v1";

/// Points in the base mesh. Every index below is smaller than this.
pub const MESH_POINTS: usize = 468;
/// Points in the mesh with refined iris landmarks.
pub const MESH_POINTS_WITH_IRIS: usize = 478;

// --- Outline and widths ---
pub const FOREHEAD_TOP: usize = 10;
pub const CHIN: usize = 152;
pub const CHEEK_LEFT: usize = 234;
pub const CHEEK_RIGHT: usize = 454;
pub const JAW_LEFT: usize = 172;
pub const JAW_RIGHT: usize = 397;
pub const FOREHEAD_LEFT: usize = 103;
pub const FOREHEAD_RIGHT: usize = 332;
pub const MIDFACE_LEFT: usize = 93;
pub const MIDFACE_RIGHT: usize = 323;

// --- Brows and eyes ---
pub const BROW_CENTER: usize = 9;
pub const LEFT_BROW_MID: usize = 105;
pub const RIGHT_BROW_MID: usize = 334;
pub const LEFT_UPPER_LID: usize = 159;
pub const RIGHT_UPPER_LID: usize = 386;
pub const LEFT_LOWER_LID: usize = 145;
pub const RIGHT_LOWER_LID: usize = 374;
pub const LEFT_EYE_OUTER: usize = 33;
pub const LEFT_EYE_INNER: usize = 133;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const RIGHT_EYE_INNER: usize = 362;
pub const LEFT_IRIS_CENTER: usize = 468;
pub const RIGHT_IRIS_CENTER: usize = 473;

// --- Nose and mouth ---
pub const UPPER_LIP_TOP: usize = 0;
pub const NOSE_ALA_LEFT: usize = 102;
pub const NOSE_ALA_RIGHT: usize = 331;
pub const MOUTH_LEFT: usize = 61;
pub const MOUTH_RIGHT: usize = 291;

// --- Region polygons ---
pub const LEFT_CHEEK: [usize; 8] = [123, 50, 205, 117, 118, 101, 214, 212];
pub const RIGHT_CHEEK: [usize; 8] = [352, 280, 425, 346, 347, 330, 434, 432];
pub const FOREHEAD: [usize; 12] = [103, 104, 105, 9, 334, 333, 332, 297, 338, 10, 109, 67];
pub const NOSE: [usize; 8] = [197, 195, 5, 4, 1, 2, 94, 168];
/// Lower jaw loop, the beard zone.
pub const JAW_LOOP: [usize; 13] = [172, 136, 150, 149, 176, 148, 152, 377, 400, 378, 379, 365, 397];
/// Between the nostrils and the upper lip, the moustache zone.
pub const UPPER_LIP_ZONE: [usize; 8] = [2, 326, 327, 391, 0, 165, 98, 97];
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];
pub const LEFT_EYE: [usize; 8] = [33, 160, 159, 158, 133, 153, 145, 144];
pub const RIGHT_EYE: [usize; 8] = [362, 385, 386, 387, 263, 373, 374, 380];
pub const LEFT_BROW: [usize; 10] = [70, 63, 105, 66, 107, 55, 65, 52, 53, 46];
pub const RIGHT_BROW: [usize; 10] = [300, 293, 334, 296, 336, 285, 295, 282, 283, 276];
pub const LIPS: [usize; 20] = [
    61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 375, 321, 405, 314, 17, 84, 181, 91, 146,
];

/// Eye-contour points used to approximate the iris centre when the mesh has
/// no refined iris landmarks.
pub const LEFT_EYE_CONTOUR: [usize; 4] = [LEFT_EYE_OUTER, LEFT_EYE_INNER, LEFT_UPPER_LID, LEFT_LOWER_LID];
pub const RIGHT_EYE_CONTOUR: [usize; 4] = [RIGHT_EYE_OUTER, RIGHT_EYE_INNER, RIGHT_UPPER_LID, RIGHT_LOWER_LID];
