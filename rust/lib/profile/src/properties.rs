//! Declared analyzer properties.
//!
//! Each entry of the [`properties!`] table yields a typed [`Property`]
//! constant, a getter and a setter on [`PropertyStore`], and a
//! [`PropertyDef`] row the store registers when it opens.

use crate::error::ProfileError;
use crate::store::PropertyStore;
use crate::value::{Color, PropertyType, PropertyValue, ValueKind};

/// A typed handle to one declared property.
pub struct Property<T> {
    key: &'static str,
    default: fn() -> T,
}

impl<T: PropertyType> Property<T> {
    pub const fn new(key: &'static str, default: fn() -> T) -> Self {
        Self { key, default }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

/// Registry row describing a declared property.
#[derive(Debug)]
pub struct PropertyDef {
    pub key: &'static str,
    pub kind: ValueKind,
    pub summary: &'static str,
    default: fn() -> PropertyValue,
}

impl PropertyDef {
    pub fn default_value(&self) -> PropertyValue {
        (self.default)()
    }
}

impl PropertyStore {
    /// Read a declared property, using its declared default when unset.
    pub fn property<T: PropertyType>(&self, prop: &Property<T>) -> T {
        self.get_or_default(prop.key, prop.default_value())
    }

    /// Read a declared property with a caller-supplied default.
    pub fn property_or<T: PropertyType>(&self, prop: &Property<T>, default: T) -> T {
        self.get_or_default(prop.key, default)
    }

    pub fn set_property<T: PropertyType>(
        &self,
        prop: &Property<T>,
        value: T,
        persist: bool,
    ) -> Result<(), ProfileError> {
        self.set(prop.key, value.into_value(), persist)
    }
}

/// Declare properties as `getter / setter / CONST: Type = default;`.
macro_rules! properties {
    ($(
        #[doc = $summary:literal]
        $getter:ident / $setter:ident / $name:ident : $ty:ty = $default:expr;
    )*) => {
        $(
            #[doc = $summary]
            pub const $name: Property<$ty> = Property::new(
                stringify!($getter),
                || -> $ty { ::core::convert::Into::into($default) },
            );
        )*

        /// Every declared property, in declaration order.
        pub static PROPERTIES: &[PropertyDef] = &[
            $(
                PropertyDef {
                    key: stringify!($getter),
                    kind: <$ty as PropertyType>::KIND,
                    summary: $summary,
                    default: || PropertyType::into_value($name.default_value()),
                },
            )*
        ];

        impl PropertyStore {
            $(
                #[doc = $summary]
                pub fn $getter(&self) -> $ty {
                    self.property(&$name)
                }

                pub fn $setter(&self, value: $ty, persist: bool) -> Result<(), ProfileError> {
                    self.set_property(&$name, value, persist)
                }
            )*
        }
    };
}

properties! {
    /// Sample number prefix for routine samples.
    statim_sample_prefix / set_statim_sample_prefix / STATIM_SAMPLE_PREFIX: String = "S";
    /// Sample number prefix for QC samples.
    qc_sample_prefix / set_qc_sample_prefix / QC_SAMPLE_PREFIX: String = "QC";
    /// Sample number prefix for calibration samples.
    cali_sample_prefix / set_cali_sample_prefix / CALI_SAMPLE_PREFIX: String = "CA";
    /// Sample number prefix for simulated samples.
    simu_sample_prefix / set_simu_sample_prefix / SIMU_SAMPLE_PREFIX: String = "SI";

    /// Placeholder shown while a result is pending or being measured.
    result_is_preparing / set_result_is_preparing / RESULT_IS_PREPARING: String = "***.*";
    /// Placeholder shown when a result cannot be calculated.
    result_can_not_be_calculated / set_result_can_not_be_calculated / RESULT_CAN_NOT_BE_CALCULATED: String = "---.-";

    /// Flag for results below the lower report limit.
    lower_report_limit_flag / set_lower_report_limit_flag / LOWER_REPORT_LIMIT_FLAG: String = "<";
    /// Flag for results above the upper report limit.
    upper_report_limit_flag / set_upper_report_limit_flag / UPPER_REPORT_LIMIT_FLAG: String = ">";
    /// Report flag for results below the lower mark limit.
    lower_mark_limit_flag / set_lower_mark_limit_flag / LOWER_MARK_LIMIT_FLAG: String = "\u{2193}";
    /// Report flag for results above the upper mark limit.
    upper_mark_limit_flag / set_upper_mark_limit_flag / UPPER_MARK_LIMIT_FLAG: String = "\u{2191}";
    /// Flag for results entered by hand.
    manual_input_flag / set_manual_input_flag / MANUAL_INPUT_FLAG: String = "M";

    /// Display color of samples waiting to be measured.
    color_of_waiting / set_color_of_waiting / COLOR_OF_WAITING: Color = Color::BLACK;
    /// Display color while reading data.
    color_of_reading / set_color_of_reading / COLOR_OF_READING: Color = Color::DARK_YELLOW;
    /// Display color while analysing.
    color_of_analysing / set_color_of_analysing / COLOR_OF_ANALYSING: Color = Color::DARK_BLUE;
    /// Display color of samples without a result.
    color_of_null_result / set_color_of_null_result / COLOR_OF_NULL_RESULT: Color = Color::RED;

    /// Semicolon separated columns of the analysis view.
    analysis_display_assay / set_analysis_display_assay / ANALYSIS_DISPLAY_ASSAY: String =
        "No.;Model;Vehicle;Weight;Speed;Date";

    /// Maximum number of QC files.
    max_qc_file / set_max_qc_file / MAX_QC_FILE: i64 = 10_i64;
    /// Active QC rule set.
    qc_method / set_qc_method / QC_METHOD: i64 = 0_i64;

    /// Corporation name printed on reports.
    corporation / set_corporation / CORPORATION: String = "Corporation Name";

    /// Whether the UI runs on a touch screen.
    is_touch_screen / set_is_touch_screen / IS_TOUCH_SCREEN: bool = false;
}
