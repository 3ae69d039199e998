//! Small raw procurement exports written to a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

pub const TENDERS_CSV: &str = "\
tender_id,customer_id,region,publish_date
T1,C1,Moscow,2024-01-10
T2,C2, moscow ,2024-02-15 10:00:00
T3,C3,Kazan,2024-03-01
T4,Counter,Kazan,2024-03-20
T1,C9,Omsk,2024-04-01
nan,C5,Omsk,2024-01-01
";

pub const LOTS_CSV: &str = "\
pn_lot,tender_id,okpd2_code,ktru_code,start_price
L1,T1,26.20.11.110,,100000
L2,T2,26.20.11.120.,,\"120 000,00\"
L3,T3,,26.20.13.000-00000001,90000
L4,T4,33.12.19,,50000
L5,T9,33.12.19,,Counter
L6,T3,26.20.11,,80000
";

/// L2 has two winners (S2 bid lower), L99 is not a known lot and one row lacks a supplier.
pub const PARTICIPANTS_CSV: &str = "\
pn_lot,post_num,supplier_region,bid_price,is_winner
L1,S1,Moscow,90000,1
L1,S2,Moscow,95000,0
L1,S3,Kazan,99000,0
L2,S1,Moscow,110000,true
L2,S2,Moscow,100000,yes
L3,S3,Kazan,85000,1
L3,S2,Moscow,88000,0
L4,S4,Kazan,45000,1
L4,S3,Kazan,47000,0
L5,S4,Kazan,,0
L5,S5,Omsk,30000,1
L1,S2,Moscow,95000,0
L99,S1,Moscow,1000,1
L2,,Moscow,1,0
";

pub struct ExportPaths {
    pub tenders: PathBuf,
    pub lots: PathBuf,
    pub participants: PathBuf,
}

pub fn write_exports(dir: &Path) -> ExportPaths {
    let paths = ExportPaths {
        tenders: dir.join("tenders.csv"),
        lots: dir.join("lots.csv"),
        participants: dir.join("participants.csv"),
    };
    fs::write(&paths.tenders, TENDERS_CSV).expect("write tenders");
    fs::write(&paths.lots, LOTS_CSV).expect("write lots");
    fs::write(&paths.participants, PARTICIPANTS_CSV).expect("write participants");
    paths
}
