use crate::error::FieldError;
use crate::schema::{self, PatchLoadData};
use crate::values::FieldValues;
use g2_types::AreaId;

/// DSP load of one patch area, as percentages of what the synth can run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PatchLoad {
    pub area: Option<AreaId>,
    pub cycles: f64,
    pub memory: f64,
}

// Some load values are split into two 7 bit halves.
fn word14(values: &FieldValues, msb: PatchLoadData, lsb: PatchLoadData) -> Result<u32, FieldError> {
    Ok(values.int(msb)? * 128 + values.int(lsb)?)
}

impl TryFrom<&FieldValues> for PatchLoad {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        let red = word14(values, PatchLoadData::CyclesRed1Msb, PatchLoadData::CyclesRed1Lsb)?;
        let blue = word14(values, PatchLoadData::CyclesBlue1Msb, PatchLoadData::CyclesBlue1Lsb)?;
        let resource4 = word14(values, PatchLoadData::Resource4Msb, PatchLoadData::Resource4Lsb)?;
        let internal = values.int(PatchLoadData::InternalMem)?;
        let ram = values.int(PatchLoadData::Ram)?;

        let cycles = 100.0 * red as f64 / 1372.0 + 100.0 * blue as f64 / 5000.0;
        let memory = (100.0 * internal as f64 / 128.0)
            .max(100.0 * (ram / 260000) as f64)
            .max(100.0 * resource4 as f64 / 4315.0);

        Ok(Self {
            area: AreaId::from_index(values.int(PatchLoadData::Location)?),
            cycles,
            memory,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SelectedParam {
    pub area: Option<AreaId>,
    pub module: u32,
    pub param: u32,
}

impl TryFrom<&FieldValues> for SelectedParam {
    type Error = FieldError;

    fn try_from(values: &FieldValues) -> Result<Self, Self::Error> {
        Ok(Self {
            area: AreaId::from_index(values.int(schema::SelectedParam::Location)?),
            module: values.int(schema::SelectedParam::Module)?,
            param: values.int(schema::SelectedParam::Param)?,
        })
    }
}
