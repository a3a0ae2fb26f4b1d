//! Built-in task templates and test cases.
//!
//! The template table is the task database the canned test cases draw
//! from. The `utilization` column is the designer's estimate in permille;
//! a few entries are deliberately wrong so the adaptive policies have
//! something to discover at run time.

use crate::policy::Algorithm;

#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub id: u8,
    pub release: u32,
    pub duration: u32,
    pub rel_deadline: u32,
    pub period: u32,
    /// Estimated utilization in permille.
    pub utilization: u32,
    pub period_flexible: bool,
    pub priority: u8,
    pub preemptable: bool,
    pub muf_critical: bool,
    pub skip_gap: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct TestCase {
    pub id: u8,
    pub length: u32,
    pub algorithm: Algorithm,
    /// Template id per slot; 0 leaves the slot empty.
    pub slots: [u8; 7],
}

#[allow(clippy::too_many_arguments)]
const fn t(
    id: u8,
    release: u32,
    duration: u32,
    rel_deadline: u32,
    period: u32,
    utilization: u32,
    flexible: u8,
    priority: u8,
    muf_critical: u8,
    skip_gap: u32,
) -> TaskTemplate {
    TaskTemplate {
        id,
        release,
        duration,
        rel_deadline,
        period,
        utilization,
        period_flexible: flexible != 0,
        priority,
        preemptable: true,
        muf_critical: muf_critical != 0,
        skip_gap,
    }
}

#[rustfmt::skip]
pub const TEMPLATES: [TaskTemplate; 91] = [
    //  id  rel  dur  dline  per  util  flex pri muf skip
    t(  1,   0,  17,  100,  100,  170,  1,  1,  0,  0),
    t(  2,   0,  22,  150,  150,  147,  0,  2,  0,  0),
    t(  3,   0,  31,  180,  180,  172,  0,  3,  0,  0),
    t(  4,   0,  15,  250,  250,   60,  0,  4,  0,  0),
    t(  5,   0,  26,  260,  260,  100,  0,  5,  0,  0),
    t(  6,   0,  18,  310,  310,   58,  0,  6,  0,  0),
    t(  7,   0,   6,  320,  320,   19,  0,  7,  0,  0),
    t(  8,   0,  17,  100,  100,  170,  0,  7,  0,  0),
    t(  9,   0,   6,  320,  320,   19,  0,  1,  0,  0),
    t( 10,   0,  22,  110,  110,  200,  0,  2,  0,  0),
    t( 11,   0,  31,  180,  180,  172,  0,  3,  0,  0),
    t( 12,   0,  15,  200,  200,   75,  0,  4,  0,  0),
    t( 13,   0,  26,  210,  210,  124,  0,  5,  0,  0),
    t( 14,   0,  18,  250,  250,   72,  0,  6,  0,  0),
    t( 15,   0,  10,  300,  300,   33,  0,  7,  0,  0),
    t( 16,   0,  45,  100,  100,  450,  0,  1,  0,  0),
    t( 17,   0,  30,  200,  200,  150,  0,  2,  0,  0),
    t( 18,   0,  30,  300,  300,  100,  0,  3,  0,  0),
    t( 19,   0,  30,  400,  400,   75,  0,  4,  0,  0),
    t( 20,   0,  30,  500,  500,   60,  0,  5,  0,  0),
    t( 21,   0,  30,  600,  600,   50,  0,  6,  0,  0),
    t( 22,   0,  25,  700,  700,   36,  0,  7,  0,  0),
    t( 23,   0,  29,  100,  100,  290,  0,  0,  0,  0),
    t( 24,   0,  35,  150,  150,  233,  0,  2,  0,  0),
    t( 25,   0,  10,  180,  180,   56,  0,  3,  0,  0),
    t( 26,   0,  25,  250,  250,  100,  0,  4,  0,  0),
    t( 27,   0,  38,  260,  260,  146,  0,  5,  0,  0),
    t( 28,   0,  28,  310,  310,   90,  0,  6,  0,  0),
    t( 29,   0,  27,  320,  320,   85,  0,  7,  0,  0),
    t( 30,   0,  29,  100,  100,  290,  0,  1,  0,  0),
    t( 31,   0,  27,  315,  315,   85,  0,  7,  0,  0),
    t( 32,   0,   4,    8,    8,  500,  0,  1,  0,  0),
    t( 33,   0,   6,   12,   12,  500,  0,  2,  0,  0),
    t( 34,   0,   5,   20,   20,  250,  0,  3,  0,  0),
    t( 35,   0, 100,  200,  200,  500,  0,  1,  0,  0),
    t( 36,   0,  20,  100,  100,  200,  0,  2,  0,  0),
    t( 37,   0,   2,    6,    6,  333,  0,  1,  1,  0),
    t( 38,   0,   4,   10,   10,  400,  0,  2,  1,  0),
    t( 39,   0,   3,   12,   12,  250,  0,  3,  1,  0),
    t( 40,   0,   4,   15,   15,  267,  0,  4,  0,  0),
    t( 41,   0,   7,   10,   10,  700,  0,  1,  0,  2),
    t( 42,   0,   3,    5,    5,  600,  0,  2,  0,  2),
    t( 43,   0,   7,   10,   10,  700,  0,  1,  0,  1),
    t( 44,   0,   3,    5,    5,  600,  0,  2,  0,  1),
    t( 45,   0,  25,  100,  100,  250,  0,  2,  0,  0),
    t( 46,   0,  35,  150,  150,  233,  0,  3,  0,  0),
    t( 47,   0,  10,  180,  180,   56,  0,  4,  0,  0),
    t( 48, 400,  50,  250,  250,  200,  0,  1,  0,  0),
    t( 49,   0,  38,  260,  260,  146,  0,  5,  0,  0),
    t( 50,   0,  30,  310,  310,   97,  0,  6,  0,  0),
    t( 51,   0,  25,  320,  320,   78,  0,  7,  0,  0),
    t( 52,   0,  67,  307,  320,  219,  0,  7,  0,  0),
    t( 53, 400,  10,  250,  250,   40,  0,  1,  0,  0),
    t( 54, 400,  20,  250,  250,   80,  0,  1,  0,  0),
    t( 55, 400,  30,  250,  250,  120,  0,  1,  0,  0),
    t( 56, 400,  40,  250,  250,  160,  0,  1,  0,  0),
    t( 57, 400,  50,  250,  250,  200,  0,  1,  0,  0),
    t( 58, 400,  60,  250,  250,  240,  0,  1,  0,  0),
    t( 59, 400,  70,  250,  250,  280,  0,  1,  0,  0),
    t( 60, 400,  80,  250,  250,  320,  0,  1,  0,  0),
    t( 61, 400,  90,  250,  250,  360,  0,  1,  0,  0),
    t( 62, 400, 100,  250,  250,  400,  0,  1,  0,  0),
    t( 63, 400, 110,  250,  250,  440,  0,  1,  0,  0),
    t( 64, 400, 120,  250,  250,  480,  0,  1,  0,  0),
    t( 65, 400, 130,  250,  250,  520,  0,  1,  0,  0),
    t( 66, 400, 140,  250,  250,  560,  0,  1,  0,  0),
    t( 67, 400, 150,  250,  250,  600,  0,  1,  0,  0),
    t( 68, 400, 160,  250,  250,  640,  0,  1,  0,  0),
    t( 69, 400, 170,  250,  250,  680,  0,  1,  0,  0),
    t( 70, 400, 180,  250,  250,  720,  0,  1,  0,  0),
    t( 71, 400, 190,  250,  250,  760,  0,  1,  0,  0),
    t( 72, 400, 200,  250,  250,  800,  0,  1,  0,  0),
    t( 73,   0,  10,   50,   50,  200,  1,  6,  0,  0),
    t( 74,   0,  20,  100,  100,  200,  1,  5,  0,  0),
    t( 75,   0,  30,  110,  110,  273,  1,  4,  0,  0),
    t( 76,   0,  30,  120,  120,  250,  1,  3,  0,  0),
    t( 77, 100,  15,  150,  150,  100,  0,  2,  0,  0),
    t( 78,  13,  15,  150,  150,  100,  0,  7,  0,  0),
    t( 79,  20,  20,  150,  150,  133,  1,  1,  0,  0),
    t( 80,   0,  14,   50,   50,  280,  1,  6,  0,  0),
    t( 81,   0,  14,   50,   50,  200,  1,  6,  0,  0),
    t( 82,   0,  10,   50,   50,  166,  1,  6,  0,  0),
    t( 83,   0,  20,  100,  100,  100,  1,  5,  0,  0),
    t( 84,   0,  30,  110,  110,   33,  1,  4,  0,  0),
    t( 85,   0,  30,  120,  120,   40,  1,  3,  0,  0),
    t( 86, 100,  15,  150,  150,   90,  0,  2,  0,  0),
    t( 87,  13,  15,  150,  150,   19,  0,  7,  0,  0),
    t( 88,  20,  20,  150,  150,   33,  1,  1,  0,  0),
    t( 89,   0,  15,   30,   30,  500,  1,  6,  0,  0),
    t( 90,   0,  20,   50,   50,  400,  0,  5,  0,  0),
    t( 91,  13,  65,  110,  110,  590,  0,  4,  0,  0),
];

const fn c(id: u8, length: u32, algorithm: Algorithm, slots: [u8; 7]) -> TestCase {
    TestCase {
        id,
        length,
        algorithm,
        slots,
    }
}

#[rustfmt::skip]
pub const TEST_CASES: [TestCase; 61] = [
    c( 1,    400, Algorithm::Rm,        [ 1,  2,  3,  4,  5,  6,  7]), // RM demo
    c( 2,    400, Algorithm::Rm,        [ 8,  2,  3,  4,  5,  6,  9]), // 1 & 7 priorities swapped
    c( 3,    400, Algorithm::Rm,        [ 1, 10, 11, 12, 13, 14, 15]), // U=0.856
    c( 4,    550, Algorithm::Rm,        [16, 17, 18, 19, 20, 21, 22]), // U=0.921 harmonic periods
    c( 5,    900, Algorithm::Rm,        [30, 24, 25, 26, 27, 28, 29]), // U=1.000
    c( 6,  30000, Algorithm::Edf,       [30, 24, 25, 26, 27, 28, 29]), // U=1.000
    c( 7,  30000, Algorithm::Edf,       [30, 24, 25, 26, 27, 28, 31]), // U=1.001, shows overrun
    c( 8,    300, Algorithm::Rm,        [32, 33, 34,  0,  0,  0,  0]), // classic overload set
    c( 9,    600, Algorithm::Llf,       [35, 36,  0,  0,  0,  0,  0]),
    c(10,    600, Algorithm::Edf,       [35, 36,  0,  0,  0,  0,  0]),
    c(11,    600, Algorithm::Mllf,      [35, 36,  0,  0,  0,  0,  0]),
    c(12,    600, Algorithm::Mllf,      [23, 24, 25, 26, 27, 28, 29]),
    c(13,    600, Algorithm::Rm,        [37, 38, 39, 40,  0,  0,  0]), // MUF task set
    c(14,    600, Algorithm::Edf,       [37, 38, 39, 40,  0,  0,  0]),
    c(15,    600, Algorithm::Muf,       [37, 38, 39, 40,  0,  0,  0]),
    c(16,    600, Algorithm::Mmuf,      [37, 38, 39, 40,  0,  0,  0]),
    c(17,    600, Algorithm::Mmmuf,     [37, 38, 39, 40,  0,  0,  0]),
    c(18,    600, Algorithm::Edf,       [41, 42,  0,  0,  0,  0,  0]), // skip tasks under plain EDF
    c(19,    600, Algorithm::EdfRto,    [41, 42,  0,  0,  0,  0,  0]),
    c(20,    600, Algorithm::EdfRto,    [43, 44,  0,  0,  0,  0,  0]),
    c(21,    600, Algorithm::Spt,       [43, 44,  0,  0,  0,  0,  0]),
    c(22,   1000, Algorithm::Rm,        [45, 46, 47,  0, 49, 50, 51]), // RM on the edge
    c(23,   1000, Algorithm::Rm,        [45, 46, 47, 48, 49, 50, 51]), // RM sporadic overload
    c(24,  10000, Algorithm::Edf,       [45, 46, 47,  0, 49, 50, 51]),
    c(25,  10000, Algorithm::Edf,       [45, 46, 47, 48, 49, 50, 51]),
    c(26,  30000, Algorithm::Edf,       [45, 46, 47,  0, 49, 50, 52]),
    c(27,  30000, Algorithm::Edf,       [45, 46, 47, 53, 49, 50, 52]),
    c(28,  30000, Algorithm::Edf,       [45, 46, 47, 54, 49, 50, 52]),
    c(29,  30000, Algorithm::Edf,       [45, 46, 47, 55, 49, 50, 52]),
    c(30,  30000, Algorithm::Edf,       [45, 46, 47, 56, 49, 50, 52]),
    c(31,  30000, Algorithm::Edf,       [45, 46, 47, 57, 49, 50, 52]),
    c(32,  30000, Algorithm::Edf,       [45, 46, 47, 58, 49, 50, 52]),
    c(33,  30000, Algorithm::Edf,       [45, 46, 47, 59, 49, 50, 52]),
    c(34,  30000, Algorithm::Edf,       [45, 46, 47, 60, 49, 50, 52]),
    c(35,  30000, Algorithm::Edf,       [45, 46, 47, 61, 49, 50, 52]),
    c(36,  30000, Algorithm::Edf,       [45, 46, 47, 62, 49, 50, 52]),
    c(37,  30000, Algorithm::Edf,       [45, 46, 47, 63, 49, 50, 52]),
    c(38,  30000, Algorithm::Edf,       [45, 46, 47, 64, 49, 50, 52]),
    c(39,  30000, Algorithm::Edf,       [45, 46, 47, 65, 49, 50, 52]),
    c(40,  30000, Algorithm::Edf,       [45, 46, 47, 66, 49, 50, 52]),
    c(41,  30000, Algorithm::Edf,       [45, 46, 47, 67, 49, 50, 52]),
    c(42,  30000, Algorithm::Edf,       [45, 46, 47, 68, 49, 50, 52]),
    c(43,  30000, Algorithm::Edf,       [45, 46, 47, 69, 49, 50, 52]),
    c(44,  30000, Algorithm::Edf,       [45, 46, 47, 70, 49, 50, 52]),
    c(45,  30000, Algorithm::Edf,       [45, 46, 47, 71, 49, 50, 52]),
    c(46,  30000, Algorithm::Edf,       [45, 46, 47, 72, 49, 50, 52]),
    c(47, 300000, Algorithm::Edf,       [30, 24, 25, 26, 27, 28, 31]), // long soak, U=1.001
    c(48,   1000, Algorithm::Adaptive1, [73, 74, 75, 76, 77, 78, 79]),
    c(49,   1000, Algorithm::Adaptive2, [73, 74, 75, 76, 77, 78, 79]),
    c(50,   1000, Algorithm::Adaptive3, [73, 74, 75, 76, 77, 78, 79]),
    c(51,   1000, Algorithm::Adaptive4, [73, 74, 75, 76, 77, 78, 79]),
    c(52,  10000, Algorithm::Adaptive4, [73, 74, 75, 76, 77, 78, 79]),
    c(53,  10000, Algorithm::Adaptive4, [80, 74, 75, 76, 77, 78, 79]), // U=1.003
    c(54,  10000, Algorithm::Adaptive4, [81, 74, 75, 76, 77, 78, 79]), // underestimated duration
    c(55,   1000, Algorithm::Adaptive5, [73, 74, 75, 76, 77, 78, 79]),
    c(56,   1000, Algorithm::Adaptive6, [82, 83, 84, 85, 86, 87, 88]),
    c(57,   1000, Algorithm::Adaptive7, [82, 83, 84, 85, 86, 87, 88]),
    c(58,    200, Algorithm::Adaptive6, [89, 90, 91,  0,  0,  0,  0]),
    c(59,    200, Algorithm::Adaptive7, [89, 90, 91,  0,  0,  0,  0]),
    c(60,    200, Algorithm::Adaptive6, [89, 92, 91,  0,  0,  0,  0]), // 92 is deliberately absent
    c(61,    200, Algorithm::Adaptive7, [89, 92, 91,  0,  0,  0,  0]),
];

pub fn template(id: u8) -> Option<&'static TaskTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

pub fn test_case(id: u8) -> Option<&'static TestCase> {
    TEST_CASES.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc;

    #[test]
    fn test_lookup() {
        assert_eq!(template(1).map(|t| t.duration), Some(17));
        assert!(template(92).is_none());
        assert!(template(0).is_none());
        assert_eq!(test_case(1).map(|c| c.length), Some(400));
        assert!(test_case(62).is_none());
    }

    #[test]
    fn test_rm_demo_set_is_schedulable() {
        let total: u32 = test_case(1)
            .unwrap()
            .slots
            .iter()
            .map(|&id| template(id).unwrap().utilization)
            .sum();
        assert_eq!(total, 726);
    }

    #[test]
    fn test_estimates_match_where_honest() {
        // the first task set's estimates agree with duration/period
        for id in 1..=7 {
            let t = template(id).unwrap();
            assert_eq!(
                calc::utilization(t.duration, t.period),
                Some(t.utilization),
                "template {}",
                id
            );
        }
    }

    #[test]
    fn test_deliberate_underestimates_present() {
        // the adaptive monitoring cases rely on wrong estimates
        let t = template(83).unwrap();
        assert!(calc::utilization(t.duration, t.period).unwrap() > t.utilization);
    }

    #[test]
    fn test_every_referenced_template_exists_except_92() {
        for case in &TEST_CASES {
            for &slot in &case.slots {
                if slot == 0 || slot == 92 {
                    continue;
                }
                assert!(template(slot).is_some(), "case {} slot {}", case.id, slot);
            }
        }
    }
}
