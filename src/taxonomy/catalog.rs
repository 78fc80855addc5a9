//! Built-in catalogue of Vietnamese administrative documents.
//!
//! Each entry is plain data; adding a document type means adding a row
//! here, never touching pipeline code.

use super::{Schema, SchemaField, TaxonomyNode};

fn t(name: &str, description: &str) -> SchemaField {
    SchemaField::text(name, description)
}

fn doc(name: &str, description: &str, fields: Vec<SchemaField>) -> TaxonomyNode {
    TaxonomyNode::doc_type(name, description, Schema::new(name, fields))
}

/// Fields shared by statutes, ordinances, decrees and circulars.
fn legal_act(number_label: &str, summary_label: &str) -> Vec<SchemaField> {
    vec![
        t("so_hieu", number_label),
        t("ngay_ban_hanh", "Ngày ban hành"),
        t("trich_yeu", summary_label),
        t("nguoi_ky", "Người ký văn bản"),
    ]
}

/// Fields shared by directive-style and consolidated texts.
fn numbered_text() -> Vec<SchemaField> {
    vec![
        t("so_kieu", "Số và ký hiệu"),
        t("ngay", "Ngày tháng năm"),
        t("tieu_de", "Tiêu đề văn bản"),
        t("nguoi_ky", "Người ký văn bản"),
    ]
}

fn identity() -> TaxonomyNode {
    TaxonomyNode::category(
        "identity",
        "Giấy tờ tùy thân: CCCD, hộ chiếu, giấy khai sinh, thẻ sinh viên",
        vec![
            doc(
                "national_id",
                "Căn cước công dân (CCCD)",
                vec![
                    t("so_cccd", "Số CCCD 12 chữ số"),
                    t("ho_ten", "Họ và tên đầy đủ"),
                    t("ngay_sinh", "Ngày sinh (dd/mm/yyyy)"),
                    t("gioi_tinh", "Giới tính"),
                    t("quoc_tich", "Quốc tịch"),
                    t("que_quan", "Quê quán"),
                    t("noi_thuong_tru", "Nơi thường trú"),
                    t("ngay_het_han", "Ngày hết hạn"),
                ],
            ),
            doc(
                "passport",
                "Hộ chiếu",
                vec![
                    t("loai", "Loại hộ chiếu (P, PD, PS...)"),
                    t("ma_so", "Mã số quốc gia"),
                    t("so_ho_chieu", "Số hộ chiếu"),
                    t("ho", "Họ (Surname)"),
                    t("chu_dem_va_ten", "Chữ đệm và tên (Given names)"),
                    t("quoc_tich", "Quốc tịch"),
                    t("ngay_sinh", "Ngày sinh"),
                    t("gioi_tinh", "Giới tính"),
                    t("so_cccd", "Số CCCD liên kết"),
                    t("ngay_cap", "Ngày cấp"),
                    t("ngay_het_han", "Ngày hết hạn"),
                ],
            ),
            doc(
                "birth_certificate",
                "Giấy khai sinh",
                vec![
                    t("so_giay", "Số giấy khai sinh"),
                    t("ho_ten", "Họ và tên"),
                    t("ngay_sinh", "Ngày sinh"),
                    t("gioi_tinh", "Giới tính"),
                    t("dan_toc", "Dân tộc"),
                    t("noi_sinh", "Nơi sinh"),
                    t("que_quan", "Quê quán"),
                    t("ho_ten_cha", "Họ tên cha"),
                    t("ho_ten_me", "Họ tên mẹ"),
                ],
            ),
            doc(
                "student_card",
                "Thẻ sinh viên",
                vec![
                    t("ma_sv", "Mã số sinh viên"),
                    t("ho_ten", "Họ và tên"),
                    t("ngay_sinh", "Ngày sinh"),
                    t("lop", "Lớp"),
                    t("khoa", "Khoa"),
                    t("nganh", "Ngành"),
                    t("khoa_hoc", "Khóa học"),
                    t("truong", "Tên trường"),
                ],
            ),
        ],
    )
    .with_title("Giấy tờ tùy thân")
    .with_icon("🪪")
}

fn vehicle() -> TaxonomyNode {
    TaxonomyNode::category(
        "vehicle",
        "Giấy tờ phương tiện: bằng lái xe, đăng ký xe, đăng kiểm",
        vec![
            doc(
                "driver_license",
                "Giấy phép lái xe (bằng lái)",
                vec![
                    t("so_gplx", "Số GPLX"),
                    t("ho_ten", "Họ và tên"),
                    t("ngay_sinh", "Ngày sinh"),
                    t("quoc_tich", "Quốc tịch"),
                    t("hang", "Hạng (A1, B2, C...)"),
                    t("ngay_cap", "Ngày cấp"),
                    t("ngay_het_han", "Có giá trị đến"),
                    t("noi_cap", "Nơi cấp"),
                ],
            ),
            doc(
                "vehicle_registration",
                "Giấy đăng ký xe",
                vec![
                    t("bien_so_xe", "Biển số xe"),
                    t("nhan_hieu", "Nhãn hiệu"),
                    t("mau_xe", "Màu xe"),
                    t("so_khung", "Số khung"),
                    t("so_may", "Số máy"),
                    t("ten_chu_xe", "Tên chủ xe"),
                    t("so", "Số đăng ký"),
                ],
            ),
            doc(
                "vehicle_inspection",
                "Giấy chứng nhận đăng kiểm xe",
                vec![
                    t("bien_so_xe", "Biển số xe"),
                    t("ngay_kiem_dinh", "Ngày kiểm định"),
                    t("ngay_het_han", "Ngày hết hạn"),
                    t("so_tem", "Số tem đăng kiểm"),
                    t("trung_tam_dk", "Trung tâm đăng kiểm"),
                ],
            ),
        ],
    )
    .with_title("Giấy tờ phương tiện")
    .with_icon("🚗")
}

fn finance() -> TaxonomyNode {
    TaxonomyNode::category(
        "finance",
        "Giấy tờ tài chính: hóa đơn, hợp đồng, bill chuyển khoản",
        vec![
            doc(
                "contract",
                "Hợp đồng",
                vec![
                    t("so_hop_dong", "Số hợp đồng"),
                    t("ngay_ky", "Ngày ký"),
                    t("ben_a", "Tên bên A"),
                    t("ben_b", "Tên bên B"),
                    t("noi_dung_chinh", "Nội dung chính của hợp đồng"),
                    t("gia_tri_hop_dong", "Giá trị hợp đồng"),
                    t("thoi_han", "Thời hạn hợp đồng"),
                ],
            ),
            doc(
                "bank_transfer",
                "Bill chuyển khoản ngân hàng",
                vec![
                    t("trang_thai", "Trạng thái giao dịch (thành công/thất bại)"),
                    t("so_tien", "Số tiền giao dịch"),
                    t("ten_nguoi_chuyen", "Tên người chuyển tiền"),
                    t("so_tai_khoan_nguoi_chuyen", "Số tài khoản người chuyển"),
                    t("ten_nguoi_nhan", "Tên người nhận tiền"),
                    t("so_tai_khoan_nguoi_nhan", "Số tài khoản người nhận"),
                    t("ten_ngan_hang_nhan", "Tên ngân hàng người nhận"),
                    t("thoi_gian", "Thời gian thực hiện giao dịch"),
                    t("ma_giao_dich", "Mã giao dịch"),
                    t("noi_dung_chuyen_tien", "Nội dung chuyển tiền"),
                    t("phuong_thuc", "Phương thức chuyển tiền (Napas, SWIFT, ...)"),
                ],
            ),
            doc(
                "invoice",
                "Hóa đơn giá trị gia tăng / hóa đơn bán hàng",
                vec![
                    t("so_hoa_don", "Số hóa đơn"),
                    t("ngay_hoa_don", "Ngày lập hóa đơn"),
                    t("ten_nguoi_ban", "Tên đơn vị bán hàng"),
                    t("mst_nguoi_ban", "Mã số thuế người bán"),
                    SchemaField::list(
                        "danh_sach_mat_hang",
                        "Danh sách chi tiết hàng hóa, dịch vụ",
                        vec![
                            t("ten_hang", "Tên hàng hóa, dịch vụ"),
                            t("so_luong", "Số lượng"),
                            t("don_gia", "Đơn giá"),
                            t("thanh_tien", "Thành tiền"),
                        ],
                    ),
                    t("tong_tien_thanh_toan", "Tổng tiền thanh toán"),
                ],
            ),
        ],
    )
    .with_title("Giấy tờ tài chính")
    .with_icon("💰")
}

fn gov_legal() -> TaxonomyNode {
    TaxonomyNode::category(
        "gov_legal",
        "Văn bản quy phạm pháp luật: Luật, Pháp lệnh, Nghị định, Thông tư",
        vec![
            doc("law", "Luật - văn bản luật của Quốc hội", legal_act("Số hiệu luật", "Tên gọi/Trích yếu của luật")),
            doc("ordinance", "Pháp lệnh", legal_act("Số hiệu pháp lệnh", "Tên gọi/Trích yếu")),
            doc("order", "Lệnh - Chủ tịch nước", legal_act("Số hiệu lệnh", "Tên gọi/Trích yếu")),
            doc("decree", "Nghị định - Chính phủ", legal_act("Số hiệu nghị định", "Tên gọi/Trích yếu")),
            doc("circular", "Thông tư", legal_act("Số hiệu thông tư", "Tên gọi/Trích yếu")),
            doc("decree_law", "Sắc luật", legal_act("Số hiệu sắc luật", "Tên gọi/Trích yếu")),
            doc("edict", "Sắc lệnh", legal_act("Số hiệu sắc lệnh", "Tên gọi/Trích yếu")),
            doc("consolidated_text", "Văn bản hợp nhất", numbered_text()),
        ],
    )
    .with_title("Văn bản pháp luật")
    .with_icon("📜")
}

fn gov_admin() -> TaxonomyNode {
    let resolution = || {
        vec![
            t("so_hieu", "Số hiệu văn bản"),
            t("ngay_ban_hanh", "Ngày ban hành"),
            t("trich_yeu", "Trích yếu nội dung"),
            t("co_quan_ban_hanh", "Cơ quan ban hành"),
            t("nguoi_ky", "Người ký văn bản"),
        ]
    };
    TaxonomyNode::category(
        "gov_admin",
        "Văn bản hành chính: Nghị quyết, văn bản chỉ đạo điều hành",
        vec![
            doc("government_resolution", "Nghị quyết Chính phủ", resolution()),
            doc("cabinet_meeting_resolution", "Nghị quyết phiên họp Chính phủ", resolution()),
            doc("directive", "Văn bản chỉ đạo điều hành", numbered_text()),
        ],
    )
    .with_title("Văn bản hành chính")
    .with_icon("📋")
}

pub(super) fn categories() -> Vec<TaxonomyNode> {
    vec![
        identity(),
        vehicle(),
        finance(),
        gov_legal(),
        gov_admin(),
        TaxonomyNode::category("Other", "Giấy tờ khác không thuộc các loại trên", vec![])
            .with_title("Khác"),
    ]
}
